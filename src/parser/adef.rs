//! .adef (application definition) parser

use crate::lexer::Lexer;
use crate::parse_tree::{DefFile, DefFileKind, Item, ItemKind, TokenId, TokenKind, TokenListItem};
use crate::system::{self, Error};

/// Parse one entry of a `bindings:` section.
///
/// The client side is either `*.interface` (pre-built wildcard) or
/// `exe.component.interface`; the server side is `agent.interface` or
/// `exe.component.interface`.
fn parse_binding(lexer: &mut Lexer) -> Result<Item, Error> {
    let mut contents = Vec::new();

    let first = if lexer.is_match(TokenKind::Star) {
        let star = lexer.pull(TokenKind::Star)?;
        contents.push(star);
        star
    } else {
        let exe = lexer.pull(TokenKind::Name)?;
        contents.push(exe);
        lexer.pull(TokenKind::Dot)?;
        contents.push(lexer.pull(TokenKind::Name)?);
        exe
    };
    lexer.pull(TokenKind::Dot)?;
    contents.push(lexer.pull(TokenKind::Name)?);

    lexer.pull(TokenKind::Arrow)?;

    // The server agent may turn out to be an exe name (internal binding) if
    // another '.' follows.
    let server_agent = lexer.pull(TokenKind::IpcAgent)?;
    contents.push(server_agent);
    lexer.pull(TokenKind::Dot)?;
    let mut last = lexer.pull(TokenKind::Name)?;
    contents.push(last);
    if lexer.is_match(TokenKind::Dot) {
        lexer.convert_to_name(server_agent)?;
        lexer.pull(TokenKind::Dot)?;
        last = lexer.pull(TokenKind::Name)?;
        contents.push(last);
    }

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::Binding,
        first,
        last,
        contents,
    }))
}

/// `exeName = ( componentPath ... )`-less form: an executable is a named
/// item listing component paths.
fn parse_executable(lexer: &mut Lexer) -> Result<Item, Error> {
    let exe_name = lexer.pull(TokenKind::Name)?;
    lexer.pull(TokenKind::Equals)?;
    lexer.pull(TokenKind::OpenParen)?;

    let mut contents = Vec::new();
    while lexer.is_match(TokenKind::FilePath) {
        contents.push(lexer.pull(TokenKind::FilePath)?);
    }
    let close = lexer.pull(TokenKind::CloseParen)?;

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::Executable,
        first: exe_name,
        last: close,
        contents,
    }))
}

/// `[procName =] ( exePath arg ... )` inside a `processes: run:` section.
fn parse_run_entry(lexer: &mut Lexer) -> Result<Item, Error> {
    let mut contents = Vec::new();

    let first = if lexer.is_match(TokenKind::Name) {
        let proc_name = lexer.pull(TokenKind::Name)?;
        contents.push(proc_name);
        lexer.pull(TokenKind::Equals)?;
        lexer.pull(TokenKind::OpenParen)?;
        proc_name
    } else {
        lexer.pull(TokenKind::OpenParen)?
    };

    contents.push(lexer.pull(TokenKind::FilePath)?);
    while lexer.is_match(TokenKind::FilePath) {
        contents.push(lexer.pull(TokenKind::FilePath)?);
    }
    let close = lexer.pull(TokenKind::CloseParen)?;

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::RunProcess,
        first,
        last: close,
        contents,
    }))
}

fn parse_env_vars_entry(lexer: &mut Lexer) -> Result<Item, Error> {
    let name = lexer.pull(TokenKind::Name)?;
    super::parse_simple_named_item(lexer, name, ItemKind::EnvVar, TokenKind::FilePath)
}

fn parse_processes_subsection(lexer: &mut Lexer) -> Result<Item, Error> {
    let subsection_name = lexer.pull(TokenKind::Name)?;
    let name = lexer.file().token_text(subsection_name).to_string();

    match name.as_str() {
        "run" => super::parse_complex_section(lexer, subsection_name, parse_run_entry),
        "envVars" => super::parse_complex_section(lexer, subsection_name, parse_env_vars_entry),
        "faultAction" => super::parse_fault_action(lexer, subsection_name),
        "priority" | "maxPriority" => super::parse_priority(lexer, subsection_name),
        "maxCoreDumpFileBytes" | "maxFileBytes" | "maxFileDescriptors"
        | "maxLockedMemoryBytes" => {
            super::parse_simple_section(lexer, subsection_name, TokenKind::Integer)
        }
        "watchdogAction" => super::parse_watchdog_action(lexer, subsection_name),
        "watchdogTimeout" => super::parse_watchdog_timeout(lexer, subsection_name),
        _ => Err(lexer.file().error_at(
            subsection_name,
            format!("Unexpected subsection name '{}' in 'processes' section.", name),
        )),
    }
}

/// `[alias =] exe.component.interface` inside an `extern:` section (or a
/// deprecated `requires: api:` / `provides: api:` section).
pub(super) fn parse_extern_api_interface(
    lexer: &mut Lexer,
    first: TokenId,
) -> Result<Item, Error> {
    let mut contents = vec![first];

    if lexer.is_match(TokenKind::Equals) {
        // The first token was an alias; the exe name follows the '='.
        lexer.pull(TokenKind::Equals)?;
        contents.push(lexer.pull(TokenKind::Name)?);
    }

    // Rest is ".component.interface".
    lexer.pull(TokenKind::Dot)?;
    contents.push(lexer.pull(TokenKind::Name)?);
    lexer.pull(TokenKind::Dot)?;
    let last = lexer.pull(TokenKind::Name)?;
    contents.push(last);

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::ExternApiInterface,
        first,
        last,
        contents,
    }))
}

/// One entry of an `extern:` section: either an extern interface item or a
/// pre-built `requires:` / `provides:` subsection.
fn parse_extern_item(lexer: &mut Lexer) -> Result<Item, Error> {
    let first = lexer.pull(TokenKind::Name)?;

    if lexer.is_match(TokenKind::Colon) {
        let name = lexer.file().token_text(first).to_string();
        return match name.as_str() {
            "requires" => super::parse_complex_section(lexer, first, |lexer| {
                super::cdef::parse_prebuilt_api_item(lexer, ItemKind::RequiredApi)
            }),
            "provides" => super::parse_complex_section(lexer, first, |lexer| {
                super::cdef::parse_prebuilt_api_item(lexer, ItemKind::ProvidedApi)
            }),
            _ => Err(lexer.file().error_at(
                first,
                format!("Unexpected subsection name '{}' in 'extern' section.", name),
            )),
        };
    }

    parse_extern_api_interface(lexer, first)
}

fn parse_provides_subsection(lexer: &mut Lexer) -> Result<Item, Error> {
    let subsection_name = lexer.pull(TokenKind::Name)?;
    match lexer.file().token_text(subsection_name) {
        "api" => super::parse_complex_section(lexer, subsection_name, |lexer| {
            let first = lexer.pull(TokenKind::Name)?;
            parse_extern_api_interface(lexer, first)
        }),
        text => Err(lexer.file().error_at(
            subsection_name,
            format!("Unexpected subsection name '{}' in 'provides' section.", text),
        )),
    }
}

/// `[perms]? (. | treeName)` inside a `requires: configTree:` subsection.
fn parse_required_config_tree(lexer: &mut Lexer) -> Result<Item, Error> {
    let mut contents = Vec::new();
    let mut first = None;

    if lexer.is_match(TokenKind::FilePermissions) {
        let perms = lexer.pull(TokenKind::FilePermissions)?;
        let text = lexer.file().token_text(perms);
        if !matches!(text, "[r]" | "[w]" | "[rw]" | "[wr]") {
            return Err(lexer
                .file()
                .error_at(perms, "Invalid access permissions for configuration tree."));
        }
        contents.push(perms);
        first = Some(perms);
    }

    // '.' denotes the app's own tree.
    let tree_name = if lexer.is_match(TokenKind::Dot) {
        lexer.pull(TokenKind::Dot)?
    } else if lexer.is_match(TokenKind::Name) {
        lexer.pull(TokenKind::Name)?
    } else {
        return Err(lexer.error(
            "Unexpected token in configTree Subsection. File permissions (e.g., '[rw]') or \
             config tree name or '.' expected.",
        ));
    };
    contents.push(tree_name);

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::RequiredConfigTree,
        first: first.unwrap_or(tree_name),
        last: tree_name,
        contents,
    }))
}

fn parse_requires_subsection(lexer: &mut Lexer) -> Result<Item, Error> {
    let subsection_name = lexer.pull(TokenKind::Name)?;
    let name = lexer.file().token_text(subsection_name).to_string();

    match name.as_str() {
        "api" => {
            system::warnln!(
                "Warning",
                "{}: 'api' subsection in 'requires' section is deprecated in .adef files.  \
                 Use the extern section instead.",
                lexer.file().location(subsection_name)
            );
            super::parse_complex_section(lexer, subsection_name, |lexer| {
                let first = lexer.pull(TokenKind::Name)?;
                parse_extern_api_interface(lexer, first)
            })
        }
        "configTree" => {
            super::parse_complex_section(lexer, subsection_name, parse_required_config_tree)
        }
        "dir" => super::parse_complex_section(lexer, subsection_name, super::parse_required_dir),
        "file" => super::parse_complex_section(lexer, subsection_name, super::parse_required_file),
        "device" => {
            super::parse_complex_section(lexer, subsection_name, super::parse_required_device)
        }
        _ => Err(lexer.file().error_at(
            subsection_name,
            format!("Unexpected subsection name '{}' in 'requires' section.", name),
        )),
    }
}

pub(super) fn parse_section(lexer: &mut Lexer) -> Result<Item, Error> {
    let section_name = lexer.pull(TokenKind::Name)?;
    let name = lexer.file().token_text(section_name).to_string();

    match name.as_str() {
        "cpuShare" | "maxFileSystemBytes" | "maxMemoryBytes" | "maxMQueueBytes"
        | "maxQueuedSignals" | "maxThreads" | "maxSecureStorageBytes" => {
            super::parse_simple_section(lexer, section_name, TokenKind::Integer)
        }
        "bindings" => super::parse_complex_section(lexer, section_name, parse_binding),
        "bundles" => {
            super::parse_complex_section(lexer, section_name, super::parse_bundles_subsection)
        }
        "components" => super::parse_token_list_section(lexer, section_name, TokenKind::FilePath),
        "executables" => super::parse_complex_section(lexer, section_name, parse_executable),
        "extern" => super::parse_complex_section(lexer, section_name, parse_extern_item),
        "groups" => super::parse_token_list_section(lexer, section_name, TokenKind::GroupName),
        "processes" => {
            super::parse_complex_section(lexer, section_name, parse_processes_subsection)
        }
        "provides" => {
            system::warnln!(
                "Warning",
                "{}: 'provides' section is deprecated in .adef files. Use the extern section \
                 instead.",
                lexer.file().location(section_name)
            );
            super::parse_complex_section(lexer, section_name, parse_provides_subsection)
        }
        "requires" => super::parse_complex_section(lexer, section_name, parse_requires_subsection),
        "sandboxed" => super::parse_simple_section(lexer, section_name, TokenKind::Name),
        "start" => super::parse_simple_section(lexer, section_name, TokenKind::Name),
        "version" => super::parse_simple_section(lexer, section_name, TokenKind::FileName),
        "watchdogAction" => super::parse_watchdog_action(lexer, section_name),
        "watchdogTimeout" => super::parse_watchdog_timeout(lexer, section_name),
        _ => Err(lexer
            .file()
            .error_at(section_name, format!("Unrecognized section name '{}'.", name))),
    }
}

/// Parse a .adef file.
pub fn parse(file_path: &str, be_verbose: bool) -> Result<DefFile, Error> {
    let mut file = DefFile::new(DefFileKind::Adef, file_path);
    super::parse_def_file(&mut file, be_verbose, parse_section)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::write_and_parse;
    use crate::parse_tree::{ItemKind, TokenKind};

    #[test]
    fn parses_executables_and_processes() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "myApp.adef",
            "executables:\n{\n    myExe = ( myComponent )\n}\n\n\
             processes:\n{\n    run:\n    {\n        ( myExe --fast )\n    }\n}\n",
        )
        .unwrap();

        let executables = file.sections[0].as_complex().unwrap();
        let exe = executables.items[0].as_tokens().unwrap();
        assert_eq!(exe.kind, ItemKind::Executable);
        assert_eq!(file.token_text(exe.first), "myExe");
        assert_eq!(file.token_text(exe.contents[0]), "myComponent");

        let processes = file.sections[1].as_complex().unwrap();
        let run = processes.items[0].as_complex().unwrap();
        let proc = run.items[0].as_tokens().unwrap();
        assert_eq!(proc.kind, ItemKind::RunProcess);
        // Unnamed process: first token is the '('.
        assert_eq!(file.token(proc.first).kind, TokenKind::OpenParen);
        assert_eq!(file.token_text(proc.contents[0]), "myExe");
        assert_eq!(file.token_text(proc.contents[1]), "--fast");
    }

    #[test]
    fn parses_binding_forms() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "myApp.adef",
            "bindings:\n{\n    *.preBuilt -> otherApp.service\n    \
             myExe.comp.iface -> <root>.service\n    \
             myExe.comp.iface2 -> otherExe.otherComp.service\n}\n",
        )
        .unwrap();

        let bindings = file.sections[0].as_complex().unwrap();
        assert_eq!(bindings.items.len(), 3);

        let wildcard = bindings.items[0].as_tokens().unwrap();
        assert_eq!(file.token(wildcard.contents[0]).kind, TokenKind::Star);
        assert_eq!(wildcard.contents.len(), 4);

        let to_user = bindings.items[1].as_tokens().unwrap();
        assert_eq!(file.token_text(to_user.contents[3]), "<root>");

        let internal = bindings.items[2].as_tokens().unwrap();
        assert_eq!(internal.contents.len(), 6);
        // The server agent was re-tagged as an exe NAME.
        assert_eq!(file.token(internal.contents[3]).kind, TokenKind::Name);
    }

    #[test]
    fn parses_extern_with_alias() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "myApp.adef",
            "extern:\n{\n    renamed = myExe.comp.iface\n    myExe.comp.other\n}\n",
        )
        .unwrap();

        let externs = file.sections[0].as_complex().unwrap();
        let with_alias = externs.items[0].as_tokens().unwrap();
        assert_eq!(with_alias.kind, ItemKind::ExternApiInterface);
        assert_eq!(with_alias.contents.len(), 4);
        let bare = externs.items[1].as_tokens().unwrap();
        assert_eq!(bare.contents.len(), 3);
    }

    #[test]
    fn config_tree_accepts_dot() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "myApp.adef",
            "requires:\n{\n    configTree:\n    {\n        [w] .\n        otherTree\n    }\n}\n",
        )
        .unwrap();

        let requires = file.sections[0].as_complex().unwrap();
        let trees = requires.items[0].as_complex().unwrap();
        let own = trees.items[0].as_tokens().unwrap();
        assert_eq!(own.kind, ItemKind::RequiredConfigTree);
        assert_eq!(file.token_text(own.contents[0]), "[w]");
        assert_eq!(file.token(own.contents[1]).kind, TokenKind::Dot);
    }

    #[test]
    fn unknown_section_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_and_parse(dir.path(), "myApp.adef", "nonsense: 42\n").unwrap_err();
        assert!(
            err.to_string().contains("Unrecognized section name"),
            "{}",
            err
        );
    }
}
