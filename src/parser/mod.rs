//! Definition-file parsers
//!
//! One recursive-descent parser per file kind, sharing the section helpers
//! here.  `Lexer::pull` already advances past whitespace, comments and
//! processing directives, so the grammar functions only deal in meaningful
//! tokens.

pub mod adef;
pub mod api;
pub mod cdef;
pub mod mdef;
pub mod sdef;

use crate::lexer::Lexer;
use crate::parse_tree::{
    ComplexItem, ComplexKind, DefFile, Item, ItemKind, TokenId, TokenKind, TokenListItem,
};
use crate::system::{self, Error};

/// Parse every section of a definition file with the given section parser.
fn parse_def_file(
    file: &mut DefFile,
    be_verbose: bool,
    parse_section: fn(&mut Lexer) -> Result<Item, Error>,
) -> Result<(), Error> {
    if be_verbose {
        system::verboseln!("Parsing", "{}", file.path());
    }

    let mut sections = Vec::new();
    {
        let mut lexer = Lexer::new(file)?;
        while !lexer.is_match(TokenKind::EndOfFile) {
            sections.push(parse_section(&mut lexer)?);
        }
    }
    file.sections = sections;
    Ok(())
}

/// `name: value`
fn parse_simple_section(
    lexer: &mut Lexer,
    section_name: TokenId,
    value_kind: TokenKind,
) -> Result<Item, Error> {
    lexer.pull(TokenKind::Colon)?;
    let value = lexer.pull(value_kind)?;
    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::SimpleSection,
        first: section_name,
        last: value,
        contents: vec![value],
    }))
}

/// `name: { token token ... }`
fn parse_token_list_section(
    lexer: &mut Lexer,
    section_name: TokenId,
    content_kind: TokenKind,
) -> Result<Item, Error> {
    lexer.pull(TokenKind::Colon)?;
    lexer.pull(TokenKind::OpenCurly)?;

    let mut contents = Vec::new();
    while !lexer.is_match(TokenKind::CloseCurly) {
        if lexer.is_match(TokenKind::EndOfFile) {
            return Err(lexer.error("Unexpected end-of-file before end of section."));
        }
        contents.push(lexer.pull(content_kind)?);
    }
    let close = lexer.pull(TokenKind::CloseCurly)?;

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::TokenListSection,
        first: section_name,
        last: close,
        contents,
    }))
}

/// `name: { item item ... }` where each item comes from `parse_item`.
fn parse_complex_section(
    lexer: &mut Lexer,
    section_name: TokenId,
    mut parse_item: impl FnMut(&mut Lexer) -> Result<Item, Error>,
) -> Result<Item, Error> {
    lexer.pull(TokenKind::Colon)?;
    lexer.pull(TokenKind::OpenCurly)?;

    let mut items = Vec::new();
    while !lexer.is_match(TokenKind::CloseCurly) {
        if lexer.is_match(TokenKind::EndOfFile) {
            return Err(lexer.error("Unexpected end-of-file before end of section."));
        }
        items.push(parse_item(lexer)?);
    }
    let close = lexer.pull(TokenKind::CloseCurly)?;

    Ok(Item::Complex(ComplexItem {
        kind: ComplexKind::Section,
        name: section_name,
        first: section_name,
        last: close,
        items,
    }))
}

/// A single `name = value` item (e.g. an envVars entry).
fn parse_simple_named_item(
    lexer: &mut Lexer,
    name: TokenId,
    item_kind: ItemKind,
    content_kind: TokenKind,
) -> Result<Item, Error> {
    lexer.pull(TokenKind::Equals)?;
    let value = lexer.pull(content_kind)?;
    Ok(Item::Tokens(TokenListItem {
        kind: item_kind,
        first: name,
        last: value,
        contents: vec![value],
    }))
}

/// `name: { itemName = value ... }`
fn parse_simple_named_item_list_section(
    lexer: &mut Lexer,
    section_name: TokenId,
    item_kind: ItemKind,
    content_kind: TokenKind,
) -> Result<Item, Error> {
    parse_complex_section(lexer, section_name, |lexer| {
        let name = lexer.pull(TokenKind::Name)?;
        parse_simple_named_item(lexer, name, item_kind, content_kind)
    })
}

const FAULT_ACTIONS: &[&str] = &["ignore", "restart", "restartApp", "stopApp", "reboot"];
const WATCHDOG_ACTIONS: &[&str] = &[
    "ignore",
    "restart",
    "stop",
    "restartApp",
    "stopApp",
    "reboot",
];

fn parse_fault_action(lexer: &mut Lexer, section_name: TokenId) -> Result<Item, Error> {
    let item = parse_simple_section(lexer, section_name, TokenKind::Name)?;
    let value = item.as_tokens().and_then(|t| t.contents.first().copied());
    if let Some(value) = value {
        let text = lexer.file().token_text(value);
        if !FAULT_ACTIONS.contains(&text) {
            return Err(lexer
                .file()
                .error_at(value, format!("Unknown fault action '{}'.", text)));
        }
    }
    Ok(item)
}

fn parse_watchdog_action(lexer: &mut Lexer, section_name: TokenId) -> Result<Item, Error> {
    let item = parse_simple_section(lexer, section_name, TokenKind::Name)?;
    let value = item.as_tokens().and_then(|t| t.contents.first().copied());
    if let Some(value) = value {
        let text = lexer.file().token_text(value);
        if !WATCHDOG_ACTIONS.contains(&text) {
            return Err(lexer
                .file()
                .error_at(value, format!("Unknown watchdog action '{}'.", text)));
        }
    }
    Ok(item)
}

/// `watchdogTimeout: <integer>` or `watchdogTimeout: never`
fn parse_watchdog_timeout(lexer: &mut Lexer, section_name: TokenId) -> Result<Item, Error> {
    lexer.pull(TokenKind::Colon)?;

    let value = if lexer.is_match(TokenKind::Integer) {
        lexer.pull(TokenKind::Integer)?
    } else {
        let value = lexer.pull(TokenKind::Name)?;
        if lexer.file().token_text(value) != "never" {
            return Err(lexer.file().error_at(
                value,
                "Watchdog timeout must be an integer or the word 'never'.",
            ));
        }
        value
    };

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::SimpleSection,
        first: section_name,
        last: value,
        contents: vec![value],
    }))
}

/// `priority: idle|low|medium|high|rtN` — validated when modelled.
fn parse_priority(lexer: &mut Lexer, section_name: TokenId) -> Result<Item, Error> {
    parse_simple_section(lexer, section_name, TokenKind::Name)
}

/// `[perms]? srcPath destPath` — the shared shape of bundled items and
/// required devices.
fn parse_permissioned_path_pair(lexer: &mut Lexer, kind: ItemKind) -> Result<Item, Error> {
    let mut contents = Vec::new();
    let first;
    if lexer.is_match(TokenKind::FilePermissions) {
        first = lexer.pull(TokenKind::FilePermissions)?;
        contents.push(first);
        contents.push(lexer.pull(TokenKind::FilePath)?); // src
    } else {
        first = lexer.pull(TokenKind::FilePath)?; // src
        contents.push(first);
    }
    let dest = lexer.pull(TokenKind::FilePath)?;
    contents.push(dest);

    Ok(Item::Tokens(TokenListItem {
        kind,
        first,
        last: dest,
        contents,
    }))
}

/// A `bundles:` subsection: `file: {...}` or `dir: {...}`.
fn parse_bundles_subsection(lexer: &mut Lexer) -> Result<Item, Error> {
    let subsection_name = lexer.pull(TokenKind::Name)?;
    let kind = match lexer.file().token_text(subsection_name) {
        "file" => ItemKind::BundledFile,
        "dir" => ItemKind::BundledDir,
        text => {
            return Err(lexer.file().error_at(
                subsection_name,
                format!("Unexpected subsection name '{}' in 'bundles' section.", text),
            ));
        }
    };
    parse_complex_section(lexer, subsection_name, |lexer| {
        parse_permissioned_path_pair(lexer, kind)
    })
}

/// `srcPath destPath` inside a `requires: file:`/`dir:` subsection.
fn parse_required_file_or_dir(lexer: &mut Lexer, kind: ItemKind) -> Result<Item, Error> {
    let src = lexer.pull(TokenKind::FilePath)?;
    let dest = lexer.pull(TokenKind::FilePath)?;
    Ok(Item::Tokens(TokenListItem {
        kind,
        first: src,
        last: dest,
        contents: vec![src, dest],
    }))
}

fn parse_required_file(lexer: &mut Lexer) -> Result<Item, Error> {
    parse_required_file_or_dir(lexer, ItemKind::RequiredFile)
}

fn parse_required_dir(lexer: &mut Lexer) -> Result<Item, Error> {
    parse_required_file_or_dir(lexer, ItemKind::RequiredDir)
}

/// `[perms]? srcPath destPath` inside a `requires: device:` subsection.
fn parse_required_device(lexer: &mut Lexer) -> Result<Item, Error> {
    parse_permissioned_path_pair(lexer, ItemKind::RequiredDevice)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::parse_tree::DefFile;
    use std::path::Path;

    /// Write a definition file into a directory and parse it.
    pub fn write_and_parse(
        dir: &Path,
        name: &str,
        content: &str,
    ) -> Result<DefFile, crate::system::Error> {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        let path = path.display().to_string();
        match name.rsplit('.').next().unwrap() {
            "adef" => super::adef::parse(&path, false),
            "cdef" => super::cdef::parse(&path, false),
            "sdef" => super::sdef::parse(&path, false),
            "mdef" => super::mdef::parse(&path, false),
            other => panic!("unknown def extension: {}", other),
        }
    }
}
