//! Structural edits of definition files
//!
//! mkedit rewrites .sdef and .adef files in place without reformatting
//! anything around the target item.  Edits are expressed as byte-range
//! splices located through token offsets captured while parsing; the
//! rewritten content goes to a temporary file that is renamed over the
//! original on success and removed on failure.

use crate::parse_tree::{DefFile, Item, TokenId, TokenKind};
use crate::parser;
use crate::system::{self, path, Error};

/// Replace bytes [start, end) of the input with `insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub start: usize,
    pub end: usize,
    pub insert: String,
}

/// Apply a set of splices to a file's bytes.  Splices must not overlap;
/// they are applied in position order.
pub fn apply_splices(input: &[u8], splices: &[Splice]) -> Result<Vec<u8>, Error> {
    let mut splices: Vec<&Splice> = splices.iter().collect();
    splices.sort_by_key(|s| s.start);

    let mut output = Vec::with_capacity(input.len());
    let mut cursor = 0;
    for splice in splices {
        if splice.start < cursor || splice.end > input.len() || splice.end < splice.start {
            return Err(Error::Edit(format!(
                "Overlapping or out-of-range edit at byte {}.",
                splice.start
            )));
        }
        output.extend_from_slice(&input[cursor..splice.start]);
        output.extend_from_slice(splice.insert.as_bytes());
        cursor = splice.end;
    }
    output.extend_from_slice(&input[cursor..]);
    Ok(output)
}

/// Rewrite a definition file through a temporary file and atomic rename.
fn rewrite_file(file_path: &str, splices: &[Splice]) -> Result<(), Error> {
    let input = system::read_bytes(file_path)?;
    let output = apply_splices(&input, splices)?;

    let temp_path = path::combine(
        &path::get_containing_dir(file_path),
        &format!("mkedit_temp.{}", file_path.rsplit('.').next().unwrap_or("def")),
    );

    if let Err(e) = system::write_file(&temp_path, &output) {
        let _ = system::remove_file(&temp_path);
        return Err(e);
    }
    if let Err(e) = system::rename_file(&temp_path, file_path) {
        let _ = system::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Strip a definition-file suffix from a line before inserting it.
fn strip_def_suffix(line: &str) -> String {
    for suffix in [".adef", ".mdef"] {
        if path::has_suffix(line, suffix) {
            return path::remove_suffix(line, suffix);
        }
    }
    line.to_string()
}

/// The byte range covering one parse-tree item in the top-level file,
/// extended backwards over the preceding whitespace so the item's newline
/// and indentation go with it.
fn item_cut_range(file: &DefFile, first: TokenId, last: TokenId) -> (usize, usize) {
    let start = match file.token(first).prev {
        Some(prev) if file.token(prev).kind == TokenKind::Whitespace => {
            file.token(prev).byte_offset
        }
        _ => file.token(first).byte_offset,
    };
    (start, file.token(last).end_offset())
}

/// true if a token belongs to the top-level file (not an included
/// fragment), so its offsets are valid for editing that file.
fn in_root_fragment(file: &DefFile, token: TokenId) -> bool {
    file.token(token).fragment == file.root_fragment()
}

/// Find a named section of the top-level file.
fn find_section<'a>(file: &'a DefFile, names: &[&str]) -> Option<&'a Item> {
    file.sections.iter().find(|section| {
        names.contains(&file.token_text(section.name_token()))
            && in_root_fragment(file, section.name_token())
    })
}

/// Strip path and definition suffix from an item spec for comparison.
fn spec_matches(spec: &str, name: &str, extension: &str) -> bool {
    let stripped = path::remove_suffix(&path::get_last_node(spec), extension);
    let name = path::remove_suffix(&path::get_last_node(name), extension);
    stripped == name
}

/// Append a whole new section at the end of the file.
fn append_section_splice(file_len: usize, section_name: &str, line: &str) -> Splice {
    Splice {
        start: file_len,
        end: file_len,
        insert: format!("\n{}:\n{{\n    {}\n}}\n", section_name, line),
    }
}

/// What to do to a definition file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    Add,
    Remove,
    Rename,
}

/// Shared implementation for the .sdef list sections (apps: holds complex
/// items, kernelModules: holds plain tokens).
struct ListSectionEdit<'a> {
    section_names: &'a [&'a str],
    extension: &'a str,
    what: &'a str,
}

impl ListSectionEdit<'_> {
    /// Entries of the section as (first, last) token pairs.
    fn entries(&self, section: &Item) -> Vec<(TokenId, TokenId)> {
        match section {
            Item::Complex(complex) => complex
                .items
                .iter()
                .map(|item| (item.first(), item.last()))
                .collect(),
            Item::Tokens(tokens) => tokens.contents.iter().map(|&t| (t, t)).collect(),
        }
    }

    fn apply(
        &self,
        file_path: &str,
        file: &DefFile,
        action: EditAction,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<(), Error> {
        let section = find_section(file, self.section_names);

        let found = section.and_then(|section| {
            self.entries(section)
                .into_iter()
                .find(|&(first, _)| {
                    spec_matches(file.token_text(first), name, self.extension)
                })
        });

        match action {
            EditAction::Add => {
                if let Some((first, _)) = found {
                    return Err(file.error_at(
                        first,
                        format!("{} already listed: '{}'", self.what, name),
                    ));
                }
                let line = strip_def_suffix(name);
                let splice = match section {
                    Some(section) => {
                        // Insert just before the section's closing brace.
                        let close = file.token(section.last()).byte_offset;
                        Splice {
                            start: close,
                            end: close,
                            insert: format!("    {}\n", line),
                        }
                    }
                    None => {
                        let file_len = system::read_bytes(file_path)?.len();
                        append_section_splice(file_len, self.section_names[0], &line)
                    }
                };
                rewrite_file(file_path, &[splice])
            }
            EditAction::Remove => {
                let (first, last) = found.ok_or_else(|| {
                    Error::Edit(format!(
                        "{} '{}' not listed in {}: section.",
                        self.what, name, self.section_names[0]
                    ))
                })?;
                let (start, end) = item_cut_range(file, first, last);
                rewrite_file(
                    file_path,
                    &[Splice {
                        start,
                        end,
                        insert: String::new(),
                    }],
                )
            }
            EditAction::Rename => {
                let (first, _) = found.ok_or_else(|| {
                    Error::Edit(format!(
                        "{} '{}' not listed in {}: section.",
                        self.what, name, self.section_names[0]
                    ))
                })?;
                let new_name = new_name.ok_or_else(|| {
                    Error::Edit("A new name is required for a rename.".to_string())
                })?;
                let token = file.token(first);
                rewrite_file(
                    file_path,
                    &[Splice {
                        start: token.byte_offset,
                        end: token.end_offset(),
                        insert: strip_def_suffix(new_name),
                    }],
                )
            }
        }
    }
}

/// Add, remove or rename an app in a .sdef's apps: section.
pub fn edit_app(
    sdef_path: &str,
    action: EditAction,
    name: &str,
    new_name: Option<&str>,
) -> Result<(), Error> {
    let file = parser::sdef::parse(sdef_path, false)?;
    ListSectionEdit {
        section_names: &["apps"],
        extension: ".adef",
        what: "App",
    }
    .apply(sdef_path, &file, action, name, new_name)
}

/// Add, remove or rename a kernel module in a .sdef's kernelModules:
/// section.
pub fn edit_module(
    sdef_path: &str,
    action: EditAction,
    name: &str,
    new_name: Option<&str>,
) -> Result<(), Error> {
    let file = parser::sdef::parse(sdef_path, false)?;
    ListSectionEdit {
        section_names: &["kernelModules", "kernelModule"],
        extension: ".mdef",
        what: "Module",
    }
    .apply(sdef_path, &file, action, name, new_name)
}

/// Collect splices renaming every reference to a component (or process run
/// entry) inside an executables: / components: / processes: run: section.
fn component_reference_splices(
    file: &DefFile,
    name: &str,
    new_name: &str,
    splices: &mut Vec<Splice>,
) {
    let mut rename_token = |token: TokenId| {
        if !in_root_fragment(file, token) {
            return;
        }
        if spec_matches(file.token_text(token), name, "") {
            let t = file.token(token);
            splices.push(Splice {
                start: t.byte_offset,
                end: t.end_offset(),
                insert: new_name.to_string(),
            });
        }
    };

    for section in &file.sections {
        match file.token_text(section.name_token()) {
            "components" => {
                if let Item::Tokens(tokens) = section {
                    for &token in &tokens.contents {
                        rename_token(token);
                    }
                }
            }
            "executables" => {
                if let Item::Complex(complex) = section {
                    for item in &complex.items {
                        if let Item::Tokens(exe) = item {
                            for &token in &exe.contents {
                                rename_token(token);
                            }
                        }
                    }
                }
            }
            "processes" => {
                if let Item::Complex(complex) = section {
                    for subsection in &complex.items {
                        let Item::Complex(run) = subsection else {
                            continue;
                        };
                        if file.token_text(run.name) != "run" {
                            continue;
                        }
                        for item in &run.items {
                            if let Item::Tokens(process) = item {
                                for &token in &process.contents {
                                    rename_token(token);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Find a component reference inside the components: or executables:
/// sections of an .adef.
fn find_component_reference(file: &DefFile, name: &str) -> Option<TokenId> {
    for section in &file.sections {
        match file.token_text(section.name_token()) {
            "components" => {
                if let Item::Tokens(tokens) = section {
                    for &token in &tokens.contents {
                        if in_root_fragment(file, token)
                            && spec_matches(file.token_text(token), name, "")
                        {
                            return Some(token);
                        }
                    }
                }
            }
            "executables" => {
                if let Item::Complex(complex) = section {
                    for item in &complex.items {
                        if let Item::Tokens(exe) = item {
                            for &token in &exe.contents {
                                if in_root_fragment(file, token)
                                    && spec_matches(file.token_text(token), name, "")
                                {
                                    return Some(token);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Add, remove or rename a component reference in an .adef.
///
/// Renames are two-cut edits: the components:/executables: reference and
/// any matching `processes: run:` entries change together.
pub fn edit_component(
    adef_path: &str,
    action: EditAction,
    name: &str,
    new_name: Option<&str>,
) -> Result<(), Error> {
    let file = parser::adef::parse(adef_path, false)?;

    match action {
        EditAction::Add => {
            if find_component_reference(&file, name).is_some() {
                return Err(Error::Edit(format!("Component already listed: '{}'", name)));
            }
            let splice = match find_section(&file, &["components"]) {
                Some(section) => {
                    let close = file.token(section.last()).byte_offset;
                    Splice {
                        start: close,
                        end: close,
                        insert: format!("    {}\n", name),
                    }
                }
                None => {
                    let file_len = system::read_bytes(adef_path)?.len();
                    append_section_splice(file_len, "components", name)
                }
            };
            rewrite_file(adef_path, &[splice])
        }
        EditAction::Remove => {
            let token = find_component_reference(&file, name).ok_or_else(|| {
                Error::Edit(format!("Component '{}' not listed.", name))
            })?;
            let (start, end) = item_cut_range(&file, token, token);
            rewrite_file(
                adef_path,
                &[Splice {
                    start,
                    end,
                    insert: String::new(),
                }],
            )
        }
        EditAction::Rename => {
            let new_name = new_name.ok_or_else(|| {
                Error::Edit("A new name is required for a rename.".to_string())
            })?;
            if find_component_reference(&file, name).is_none() {
                return Err(Error::Edit(format!("Component '{}' not listed.", name)));
            }
            let mut splices = Vec::new();
            component_reference_splices(&file, name, new_name, &mut splices);
            rewrite_file(adef_path, &splices)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &std::path::Path, name: &str, content: &str) -> String {
        let p = dir.join(name);
        std::fs::write(&p, content).unwrap();
        p.display().to_string()
    }

    #[test]
    fn splices_are_byte_accurate() {
        let input = b"hello cruel world";
        let output = apply_splices(
            input,
            &[Splice {
                start: 6,
                end: 12,
                insert: "kind ".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(output, b"hello kind world");
    }

    #[test]
    fn overlapping_splices_are_rejected() {
        let result = apply_splices(
            b"abcdef",
            &[
                Splice {
                    start: 0,
                    end: 3,
                    insert: String::new(),
                },
                Splice {
                    start: 2,
                    end: 4,
                    insert: String::new(),
                },
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn add_app_inserts_into_existing_section() {
        let dir = tempfile::tempdir().unwrap();
        let sdef = write(
            dir.path(),
            "sys.sdef",
            "apps:\n{\n    first\n}\n",
        );

        edit_app(&sdef, EditAction::Add, "second.adef", None).unwrap();
        let result = std::fs::read_to_string(&sdef).unwrap();
        assert_eq!(result, "apps:\n{\n    first\n    second\n}\n");
    }

    #[test]
    fn add_app_creates_missing_section() {
        let dir = tempfile::tempdir().unwrap();
        let sdef = write(dir.path(), "sys.sdef", "bindings:\n{\n}\n");

        edit_app(&sdef, EditAction::Add, "newApp", None).unwrap();
        let result = std::fs::read_to_string(&sdef).unwrap();
        assert_eq!(result, "bindings:\n{\n}\n\napps:\n{\n    newApp\n}\n");
    }

    #[test]
    fn add_duplicate_app_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sdef = write(dir.path(), "sys.sdef", "apps:\n{\n    thing\n}\n");
        let err = edit_app(&sdef, EditAction::Add, "thing", None).unwrap_err();
        assert!(err.to_string().contains("already listed"), "{}", err);
    }

    #[test]
    fn remove_app_cuts_the_entry_only() {
        let dir = tempfile::tempdir().unwrap();
        let sdef = write(
            dir.path(),
            "sys.sdef",
            "apps:\n{\n    first\n    second\n}\n",
        );

        edit_app(&sdef, EditAction::Remove, "first", None).unwrap();
        let result = std::fs::read_to_string(&sdef).unwrap();
        assert_eq!(result, "apps:\n{\n    second\n}\n");
    }

    #[test]
    fn rename_app_keeps_surrounding_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let sdef = write(
            dir.path(),
            "sys.sdef",
            "// header\napps:\n{\n    oldName   // trailing comment\n}\n",
        );

        edit_app(&sdef, EditAction::Rename, "oldName", Some("newName")).unwrap();
        let result = std::fs::read_to_string(&sdef).unwrap();
        assert_eq!(
            result,
            "// header\napps:\n{\n    newName   // trailing comment\n}\n"
        );
    }

    #[test]
    fn rename_component_updates_run_reference_too() {
        let dir = tempfile::tempdir().unwrap();
        let adef = write(
            dir.path(),
            "app.adef",
            "executables:\n{\n    exe = ( comp )\n}\n\n\
             processes:\n{\n    run:\n    {\n        ( comp )\n    }\n}\n",
        );

        edit_component(&adef, EditAction::Rename, "comp", Some("renamed")).unwrap();
        let result = std::fs::read_to_string(&adef).unwrap();
        assert_eq!(
            result,
            "executables:\n{\n    exe = ( renamed )\n}\n\n\
             processes:\n{\n    run:\n    {\n        ( renamed )\n    }\n}\n"
        );
    }

    #[test]
    fn edit_module_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sdef = write(dir.path(), "sys.sdef", "kernelModules:\n{\n    drv\n}\n");

        edit_module(&sdef, EditAction::Rename, "drv", Some("driver.mdef")).unwrap();
        assert_eq!(
            std::fs::read_to_string(&sdef).unwrap(),
            "kernelModules:\n{\n    driver\n}\n"
        );

        edit_module(&sdef, EditAction::Remove, "driver", None).unwrap();
        assert_eq!(
            std::fs::read_to_string(&sdef).unwrap(),
            "kernelModules:\n{\n}\n"
        );
    }
}
