//! .mdef (kernel module definition) parser

use crate::lexer::Lexer;
use crate::parse_tree::{DefFile, DefFileKind, Item, ItemKind, TokenKind};
use crate::system::Error;

fn parse_section(lexer: &mut Lexer) -> Result<Item, Error> {
    let section_name = lexer.pull(TokenKind::Name)?;
    let name = lexer.file().token_text(section_name).to_string();

    match name.as_str() {
        "preBuilt" => super::parse_simple_section(lexer, section_name, TokenKind::FilePath),
        "sources" => super::parse_token_list_section(lexer, section_name, TokenKind::FilePath),
        "cflags" | "ldflags" => {
            super::parse_token_list_section(lexer, section_name, TokenKind::Arg)
        }
        "params" => super::parse_simple_named_item_list_section(
            lexer,
            section_name,
            ItemKind::ModuleParam,
            TokenKind::String,
        ),
        _ => Err(lexer
            .file()
            .error_at(section_name, format!("Unrecognized keyword '{}'.", name))),
    }
}

/// Parse a .mdef file.
pub fn parse(file_path: &str, be_verbose: bool) -> Result<DefFile, Error> {
    let mut file = DefFile::new(DefFileKind::Mdef, file_path);
    super::parse_def_file(&mut file, be_verbose, parse_section)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::write_and_parse;
    use crate::parse_tree::ItemKind;

    #[test]
    fn parses_prebuilt_and_params() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "driver.mdef",
            "preBuilt: /opt/drivers/hello.ko\n\nparams:\n{\n    bufSize = \"1024\"\n}\n",
        )
        .unwrap();

        let prebuilt = file.sections[0].as_tokens().unwrap();
        assert_eq!(file.token_text(prebuilt.contents[0]), "/opt/drivers/hello.ko");

        let params = file.sections[1].as_complex().unwrap();
        let param = params.items[0].as_tokens().unwrap();
        assert_eq!(param.kind, ItemKind::ModuleParam);
        assert_eq!(file.token_text(param.first), "bufSize");
        assert_eq!(file.token_text(param.contents[0]), "\"1024\"");
    }

    #[test]
    fn parses_sources_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "driver.mdef",
            "sources:\n{\n    hello.c\n}\n\ncflags:\n{\n    -DQUIET\n}\n",
        )
        .unwrap();
        assert_eq!(file.sections.len(), 2);
    }
}
