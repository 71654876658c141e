//! .cdef (component definition) parser

use crate::lexer::Lexer;
use crate::parse_tree::{DefFile, DefFileKind, Item, ItemKind, TokenId, TokenKind, TokenListItem};
use crate::system::Error;

/// Parse an API item inside a `provides: api:` subsection:
/// `[alias =] path [server-ipc-option]...`
fn parse_provided_api(lexer: &mut Lexer) -> Result<Item, Error> {
    parse_api_item(lexer, ItemKind::ProvidedApi, TokenKind::ServerIpcOption)
}

/// Parse an API item inside a `requires: api:` subsection:
/// `[alias =] path [client-ipc-option]...`
fn parse_required_api(lexer: &mut Lexer) -> Result<Item, Error> {
    parse_api_item(lexer, ItemKind::RequiredApi, TokenKind::ClientIpcOption)
}

fn parse_api_item(
    lexer: &mut Lexer,
    kind: ItemKind,
    option_kind: TokenKind,
) -> Result<Item, Error> {
    // Assume there's only a file path.  If an '=' follows it, re-tag it as
    // the internal alias and pull the real path.
    let mut alias: Option<TokenId> = None;
    let mut api_file_path = lexer.pull(TokenKind::FilePath)?;

    if lexer.is_match(TokenKind::Equals) {
        lexer.convert_to_name(api_file_path)?;
        alias = Some(api_file_path);
        lexer.pull(TokenKind::Equals)?;
        api_file_path = lexer.pull(TokenKind::FilePath)?;
    }

    let first = alias.unwrap_or(api_file_path);
    let mut contents = Vec::new();
    if let Some(alias) = alias {
        contents.push(alias);
    }
    contents.push(api_file_path);

    let mut last = api_file_path;
    while lexer.is_match(option_kind) {
        last = lexer.pull(option_kind)?;
        contents.push(last);
    }

    Ok(Item::Tokens(TokenListItem {
        kind,
        first,
        last,
        contents,
    }))
}

/// `[ifName =] path [options]...` inside an `extern: requires:` or
/// `extern: provides:` subsection.  The interface name may be dotted.
pub(super) fn parse_prebuilt_api_item(
    lexer: &mut Lexer,
    kind: ItemKind,
) -> Result<Item, Error> {
    let option_kind = if kind == ItemKind::RequiredApi {
        TokenKind::ClientIpcOption
    } else {
        TokenKind::ServerIpcOption
    };

    let mut alias: Option<TokenId> = None;
    let mut api_file_path = lexer.pull(TokenKind::FilePath)?;

    if lexer.is_match(TokenKind::Equals) {
        lexer.convert_to_dotted_name(api_file_path)?;
        alias = Some(api_file_path);
        lexer.pull(TokenKind::Equals)?;
        api_file_path = lexer.pull(TokenKind::FilePath)?;
    }

    let first = alias.unwrap_or(api_file_path);
    let mut contents = Vec::new();
    if let Some(alias) = alias {
        contents.push(alias);
    }
    contents.push(api_file_path);

    let mut last = api_file_path;
    while lexer.is_match(option_kind) {
        last = lexer.pull(option_kind)?;
        contents.push(last);
    }

    Ok(Item::Tokens(TokenListItem {
        kind,
        first,
        last,
        contents,
    }))
}

fn parse_provides_subsection(lexer: &mut Lexer) -> Result<Item, Error> {
    let subsection_name = lexer.pull(TokenKind::Name)?;
    match lexer.file().token_text(subsection_name) {
        "api" => super::parse_complex_section(lexer, subsection_name, parse_provided_api),
        text => Err(lexer.file().error_at(
            subsection_name,
            format!("Unexpected subsection name '{}' in 'provides' section.", text),
        )),
    }
}

fn parse_requires_subsection(lexer: &mut Lexer) -> Result<Item, Error> {
    let subsection_name = lexer.pull(TokenKind::Name)?;
    match lexer.file().token_text(subsection_name) {
        "api" => super::parse_complex_section(lexer, subsection_name, parse_required_api),
        "file" => super::parse_complex_section(lexer, subsection_name, super::parse_required_file),
        "dir" => super::parse_complex_section(lexer, subsection_name, super::parse_required_dir),
        "device" => {
            super::parse_complex_section(lexer, subsection_name, super::parse_required_device)
        }
        "lib" | "component" => {
            super::parse_token_list_section(lexer, subsection_name, TokenKind::FilePath)
        }
        text => Err(lexer.file().error_at(
            subsection_name,
            format!("Unexpected subsection name '{}' in 'requires' section.", text),
        )),
    }
}

const ASSET_DATA_TYPES: &[&str] = &["bool", "int", "float", "string"];

/// The token kind a default value must have for a given asset data type.
fn default_value_kind(type_name: &str) -> Option<TokenKind> {
    match type_name {
        "bool" => Some(TokenKind::Boolean),
        "int" => Some(TokenKind::SignedInteger),
        "float" => Some(TokenKind::Float),
        "string" => Some(TokenKind::String),
        _ => None,
    }
}

/// `typeName fieldName [= default]` inside `settings:` or `variables:`.
fn parse_asset_field(lexer: &mut Lexer, kind: ItemKind) -> Result<Item, Error> {
    let data_type = lexer.pull(TokenKind::Name)?;
    let type_name = lexer.file().token_text(data_type).to_string();
    if !ASSET_DATA_TYPES.contains(&type_name.as_str()) {
        return Err(lexer.file().error_at(
            data_type,
            format!("Unknown type name, '{},' on asset field.", type_name),
        ));
    }

    let field_name = lexer.pull(TokenKind::FilePath)?;
    let mut contents = vec![field_name];
    let mut last = field_name;

    if lexer.is_match(TokenKind::Equals) {
        lexer.pull(TokenKind::Equals)?;
        // The default value's token kind must match the field's data type.
        let value_kind = match default_value_kind(&type_name) {
            Some(kind) => kind,
            None => {
                return Err(lexer.file().error_at(
                    data_type,
                    format!("Unknown type name, '{},' on asset field.", type_name),
                ));
            }
        };
        last = lexer.pull(value_kind)?;
        contents.push(last);
    }

    Ok(Item::Tokens(TokenListItem {
        kind,
        first: data_type,
        last,
        contents,
    }))
}

fn parse_asset_command(lexer: &mut Lexer) -> Result<Item, Error> {
    let name = lexer.pull(TokenKind::FilePath)?;
    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::AssetCommand,
        first: name,
        last: name,
        contents: vec![name],
    }))
}

fn parse_asset_field_type_subsection(lexer: &mut Lexer) -> Result<Item, Error> {
    let subsection_name = lexer.pull(TokenKind::Name)?;
    match lexer.file().token_text(subsection_name) {
        "settings" => super::parse_complex_section(lexer, subsection_name, |lexer| {
            parse_asset_field(lexer, ItemKind::AssetSetting)
        }),
        "variables" => super::parse_complex_section(lexer, subsection_name, |lexer| {
            parse_asset_field(lexer, ItemKind::AssetVariable)
        }),
        "commands" => super::parse_complex_section(lexer, subsection_name, parse_asset_command),
        text => Err(lexer.file().error_at(
            subsection_name,
            format!("Unexpected subsection name '{}' in 'assets' section.", text),
        )),
    }
}

fn parse_assets_subsection(lexer: &mut Lexer) -> Result<Item, Error> {
    let asset_name = lexer.pull(TokenKind::Name)?;
    let item = super::parse_complex_section(lexer, asset_name, parse_asset_field_type_subsection)?;
    match item {
        Item::Complex(mut complex) => {
            complex.kind = crate::parse_tree::ComplexKind::Asset;
            Ok(Item::Complex(complex))
        }
        Item::Tokens(_) => unreachable!("parse_complex_section returns Item::Complex"),
    }
}

fn parse_section(lexer: &mut Lexer) -> Result<Item, Error> {
    let section_name = lexer.pull(TokenKind::Name)?;
    let name = lexer.file().token_text(section_name).to_string();

    match name.as_str() {
        "cflags" | "cxxflags" | "ldflags" => {
            super::parse_token_list_section(lexer, section_name, TokenKind::Arg)
        }
        "sources" => super::parse_token_list_section(lexer, section_name, TokenKind::FilePath),
        "bundles" => {
            super::parse_complex_section(lexer, section_name, super::parse_bundles_subsection)
        }
        "provides" => super::parse_complex_section(lexer, section_name, parse_provides_subsection),
        "requires" => super::parse_complex_section(lexer, section_name, parse_requires_subsection),
        "assets" => super::parse_complex_section(lexer, section_name, parse_assets_subsection),
        _ => Err(lexer
            .file()
            .error_at(section_name, format!("Unrecognized section name '{}'.", name))),
    }
}

/// Parse a .cdef file.
pub fn parse(file_path: &str, be_verbose: bool) -> Result<DefFile, Error> {
    let mut file = DefFile::new(DefFileKind::Cdef, file_path);
    super::parse_def_file(&mut file, be_verbose, parse_section)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::write_and_parse;
    use crate::parse_tree::{Item, ItemKind, TokenKind};

    #[test]
    fn parses_sources_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "Component.cdef",
            "sources:\n{\n    foo.c\n    bar.cpp\n}\n\ncflags:\n{\n    -DDEBUG=1\n}\n",
        )
        .unwrap();

        assert_eq!(file.sections.len(), 2);
        let sources = file.sections[0].as_tokens().unwrap();
        assert_eq!(file.token_text(sources.first), "sources");
        assert_eq!(sources.contents.len(), 2);
        let cflags = file.sections[1].as_tokens().unwrap();
        assert_eq!(file.token_text(cflags.contents[0]), "-DDEBUG=1");
    }

    #[test]
    fn parses_required_api_with_alias_and_options() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "Component.cdef",
            "requires:\n{\n    api:\n    {\n        cfg = le_cfg.api [manual-start]\n    }\n}\n",
        )
        .unwrap();

        let requires = file.sections[0].as_complex().unwrap();
        let api_subsection = requires.items[0].as_complex().unwrap();
        let api = api_subsection.items[0].as_tokens().unwrap();
        assert_eq!(api.kind, ItemKind::RequiredApi);
        assert_eq!(file.token_text(api.contents[0]), "cfg");
        assert_eq!(file.token(api.contents[0]).kind, TokenKind::Name);
        assert_eq!(file.token_text(api.contents[1]), "le_cfg.api");
        assert_eq!(file.token_text(api.contents[2]), "[manual-start]");
    }

    #[test]
    fn rejects_bad_client_option() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_and_parse(
            dir.path(),
            "Component.cdef",
            "requires:\n{\n    api:\n    {\n        le_cfg.api [async]\n    }\n}\n",
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("Invalid client-side IPC option"),
            "{}",
            err
        );
    }

    #[test]
    fn asset_default_must_match_type() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_and_parse(
            dir.path(),
            "Component.cdef",
            "assets:\n{\n    myAsset:\n    {\n        settings:\n        {\n            \
             int field = \"oops\"\n        }\n    }\n}\n",
        )
        .unwrap_err();
        // The mismatch is reported at the default-value token.
        assert!(err.to_string().contains("error"), "{}", err);
    }

    #[test]
    fn asset_fields_parse() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "Component.cdef",
            "assets:\n{\n    room:\n    {\n        settings:\n        {\n            \
             bool isOn = false\n        }\n        variables:\n        {\n            \
             float temp = 21.5\n        }\n        commands:\n        {\n            \
             reset\n        }\n    }\n}\n",
        )
        .unwrap();

        let assets = file.sections[0].as_complex().unwrap();
        let asset = assets.items[0].as_complex().unwrap();
        assert_eq!(file.token_text(asset.name), "room");
        assert_eq!(asset.items.len(), 3);
        match &asset.items[0] {
            Item::Complex(settings) => {
                let field = settings.items[0].as_tokens().unwrap();
                assert_eq!(field.kind, ItemKind::AssetSetting);
                assert_eq!(file.token_text(field.first), "bool");
                assert_eq!(file.token_text(field.contents[1]), "false");
            }
            Item::Tokens(_) => panic!("expected complex settings subsection"),
        }
    }
}
