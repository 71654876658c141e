//! .sdef (system definition) parser

use crate::lexer::Lexer;
use crate::parse_tree::{
    ComplexItem, ComplexKind, DefFile, DefFileKind, Item, ItemKind, TokenKind, TokenListItem,
};
use crate::system::Error;

/// Sections of the .adef grammar that may be overridden per-app from the
/// .sdef.
fn parse_app_override(lexer: &mut Lexer) -> Result<Item, Error> {
    let section_name = lexer.pull(TokenKind::Name)?;
    let name = lexer.file().token_text(section_name).to_string();

    match name.as_str() {
        "cpuShare" | "maxCoreDumpFileBytes" | "maxFileBytes" | "maxFileDescriptors"
        | "maxFileSystemBytes" | "maxLockedMemoryBytes" | "maxMemoryBytes" | "maxMQueueBytes"
        | "maxQueuedSignals" | "watchdogTimeout" | "maxThreads" | "maxSecureStorageBytes" => {
            super::parse_simple_section(lexer, section_name, TokenKind::Integer)
        }
        "faultAction" => super::parse_fault_action(lexer, section_name),
        "groups" => super::parse_token_list_section(lexer, section_name, TokenKind::GroupName),
        "maxPriority" => super::parse_priority(lexer, section_name),
        "pools" => super::parse_simple_named_item_list_section(
            lexer,
            section_name,
            ItemKind::Pool,
            TokenKind::Integer,
        ),
        "sandboxed" => super::parse_simple_section(lexer, section_name, TokenKind::Boolean),
        "start" => super::parse_simple_section(lexer, section_name, TokenKind::Name),
        "preloaded" => super::parse_simple_section(lexer, section_name, TokenKind::Name),
        "watchdogAction" => super::parse_watchdog_action(lexer, section_name),
        _ => Err(lexer.file().error_at(
            section_name,
            format!("Unrecognized app override section name '{}'.", name),
        )),
    }
}

/// One entry of an `apps:` section: a .adef path, optionally followed by a
/// curly-braced override list.
fn parse_app(lexer: &mut Lexer) -> Result<Item, Error> {
    let app_spec = lexer.pull(TokenKind::FilePath)?;
    let mut last = app_spec;
    let mut items = Vec::new();

    if lexer.is_match(TokenKind::OpenCurly) {
        lexer.pull(TokenKind::OpenCurly)?;
        while !lexer.is_match(TokenKind::CloseCurly) {
            if lexer.is_match(TokenKind::EndOfFile) {
                let loc = lexer.file().location(app_spec);
                return Err(lexer.error(format!(
                    "Unexpected end-of-file before end of application override list for app \
                     '{}' starting at line {} character {}.",
                    lexer.file().token_text(app_spec),
                    loc.line,
                    loc.column
                )));
            }
            items.push(parse_app_override(lexer)?);
        }
        last = lexer.pull(TokenKind::CloseCurly)?;
    }

    Ok(Item::Complex(ComplexItem {
        kind: ComplexKind::App,
        name: app_spec,
        first: app_spec,
        last,
        items,
    }))
}

/// One entry of a system-level `bindings:` section:
/// `agent.interface -> agent.interface`, where either side's agent may also
/// name an exe (`app.exe.comp.interface` on the client side).
fn parse_binding(lexer: &mut Lexer) -> Result<Item, Error> {
    let mut contents = Vec::new();

    let first = lexer.pull(TokenKind::IpcAgent)?;
    contents.push(first);
    lexer.pull(TokenKind::Dot)?;

    // Client side is one of:
    //   app.interface
    //   app.*.interface
    //   app.exe.comp.interface
    if lexer.is_match(TokenKind::Star) {
        contents.push(lexer.pull(TokenKind::Star)?);
        lexer.pull(TokenKind::Dot)?;
        contents.push(lexer.pull(TokenKind::Name)?);
    } else {
        contents.push(lexer.pull(TokenKind::Name)?);
        while lexer.is_match(TokenKind::Dot) {
            lexer.pull(TokenKind::Dot)?;
            contents.push(lexer.pull(TokenKind::Name)?);
        }
    }

    lexer.pull(TokenKind::Arrow)?;

    contents.push(lexer.pull(TokenKind::IpcAgent)?);
    lexer.pull(TokenKind::Dot)?;
    let last = lexer.pull(TokenKind::Name)?;
    contents.push(last);

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::Binding,
        first,
        last,
        contents,
    }))
}

/// `cmdName = appName:/path/inside/app` inside a `commands:` section.
fn parse_command(lexer: &mut Lexer) -> Result<Item, Error> {
    let name = lexer.pull(TokenKind::FileName)?;
    lexer.pull(TokenKind::Equals)?;
    let app = lexer.pull(TokenKind::Name)?;
    lexer.pull(TokenKind::Colon)?;
    let exe_path = lexer.pull(TokenKind::FilePath)?;

    Ok(Item::Tokens(TokenListItem {
        kind: ItemKind::Command,
        first: name,
        last: exe_path,
        contents: vec![name, app, exe_path],
    }))
}

fn parse_section(lexer: &mut Lexer) -> Result<Item, Error> {
    let section_name = lexer.pull(TokenKind::Name)?;
    let name = lexer.file().token_text(section_name).to_string();

    match name.as_str() {
        "apps" => super::parse_complex_section(lexer, section_name, parse_app),
        "bindings" => super::parse_complex_section(lexer, section_name, parse_binding),
        "commands" => super::parse_complex_section(lexer, section_name, parse_command),
        "kernelModules" | "kernelModule" => {
            super::parse_token_list_section(lexer, section_name, TokenKind::FilePath)
        }
        "appSearch" | "componentSearch" | "interfaceSearch" | "moduleSearch" => {
            super::parse_token_list_section(lexer, section_name, TokenKind::FilePath)
        }
        _ => Err(lexer
            .file()
            .error_at(section_name, format!("Unrecognized section name '{}'.", name))),
    }
}

/// Parse a .sdef file.
pub fn parse(file_path: &str, be_verbose: bool) -> Result<DefFile, Error> {
    let mut file = DefFile::new(DefFileKind::Sdef, file_path);
    super::parse_def_file(&mut file, be_verbose, parse_section)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::write_and_parse;
    use crate::parse_tree::{ComplexKind, ItemKind, TokenKind};

    #[test]
    fn parses_apps_with_and_without_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "system.sdef",
            "apps:\n{\n    plain\n    tuned.adef\n    {\n        maxThreads: 4\n        \
             sandboxed: false\n    }\n}\n",
        )
        .unwrap();

        let apps = file.sections[0].as_complex().unwrap();
        assert_eq!(apps.items.len(), 2);

        let plain = apps.items[0].as_complex().unwrap();
        assert_eq!(plain.kind, ComplexKind::App);
        assert!(plain.items.is_empty());

        let tuned = apps.items[1].as_complex().unwrap();
        assert_eq!(file.token_text(tuned.name), "tuned.adef");
        assert_eq!(tuned.items.len(), 2);
    }

    #[test]
    fn app_overrides_attach_to_the_path_before_the_brace() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "system.sdef",
            "apps:\n{\n    tuned.adef\n    {\n        maxThreads: 4\n    }\n}\n",
        )
        .unwrap();

        let apps = file.sections[0].as_complex().unwrap();
        assert_eq!(apps.items.len(), 1);
        let tuned = apps.items[0].as_complex().unwrap();
        assert_eq!(tuned.items.len(), 1);
        let max_threads = tuned.items[0].as_tokens().unwrap();
        assert_eq!(file.token_text(max_threads.first), "maxThreads");
        assert_eq!(file.token_text(max_threads.contents[0]), "4");
    }

    #[test]
    fn parses_system_bindings() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "system.sdef",
            "bindings:\n{\n    clientApp.iface -> serverApp.service\n    \
             <user>.iface -> <root>.service\n    \
             app.exe.comp.iface -> serverApp.service\n}\n",
        )
        .unwrap();

        let bindings = file.sections[0].as_complex().unwrap();
        let external = bindings.items[0].as_tokens().unwrap();
        assert_eq!(external.kind, ItemKind::Binding);
        assert_eq!(external.contents.len(), 4);

        let user_to_user = bindings.items[1].as_tokens().unwrap();
        assert_eq!(file.token_text(user_to_user.contents[0]), "<user>");
        assert_eq!(file.token_text(user_to_user.contents[2]), "<root>");

        let internal = bindings.items[2].as_tokens().unwrap();
        assert_eq!(internal.contents.len(), 6);
    }

    #[test]
    fn parses_commands() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "system.sdef",
            "commands:\n{\n    status = myTools:/bin/status\n}\n",
        )
        .unwrap();

        let commands = file.sections[0].as_complex().unwrap();
        let cmd = commands.items[0].as_tokens().unwrap();
        assert_eq!(cmd.kind, ItemKind::Command);
        assert_eq!(file.token_text(cmd.contents[0]), "status");
        assert_eq!(file.token_text(cmd.contents[1]), "myTools");
        assert_eq!(file.token_text(cmd.contents[2]), "/bin/status");
    }

    #[test]
    fn unterminated_override_list_blames_the_app() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_and_parse(
            dir.path(),
            "system.sdef",
            "apps:\n{\n    tuned\n    {\n        maxThreads: 4\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("tuned"), "{}", err);
    }

    #[test]
    fn wildcard_client_binding() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_and_parse(
            dir.path(),
            "system.sdef",
            "bindings:\n{\n    app.*.iface -> serverApp.service\n}\n",
        )
        .unwrap();
        let bindings = file.sections[0].as_complex().unwrap();
        let wild = bindings.items[0].as_tokens().unwrap();
        assert_eq!(file.token(wild.contents[1]).kind, TokenKind::Star);
    }
}
