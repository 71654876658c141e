//! Lexical analyzer for definition files
//!
//! Character classes are checked with explicit ASCII predicates rather than
//! is_alphanumeric(), because definition-file names must not depend on the
//! locale or accept non-ASCII letters.

use std::collections::BTreeSet;

use crate::envvars;
use crate::parse_tree::{DefFile, FragmentId, TokenId, TokenKind};
use crate::system::{self, path, Error, Location};

/// Lexing state for one file fragment.  `#include` pushes a new context;
/// reaching the end of an included file pops one.
#[derive(Debug)]
struct Context {
    fragment: FragmentId,
    content: String,
    /// Byte offset of the next unconsumed character.
    pos: usize,
    line: usize,
    column: usize,
}

impl Context {
    fn next_char(&self) -> Option<char> {
        self.content[self.pos..].chars().next()
    }

    fn second_char(&self) -> Option<char> {
        let mut chars = self.content[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn rest(&self) -> &str {
        &self.content[self.pos..]
    }
}

/// Text and position of a token being accumulated.
struct Pending {
    kind: TokenKind,
    text: String,
    line: usize,
    column: usize,
    byte_offset: usize,
}

#[derive(Debug)]
pub struct Lexer<'a> {
    file: &'a mut DefFile,
    stack: Vec<Context>,
}

fn is_whitespace(c: char) -> bool {
    // Vertical tabs and form feeds are not allowed in def files.
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn is_letter(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_uppercase()
}

fn is_name_start(c: char) -> bool {
    is_letter(c) || c == '_'
}

fn is_name_continue(c: char) -> bool {
    is_letter(c) || c.is_ascii_digit() || c == '_'
}

fn is_file_name_char(c: char) -> bool {
    is_letter(c)
        || c.is_ascii_digit()
        || matches!(c, '.' | '_' | '$' | '-' | ':' | ';' | '+' | '=' | '?')
}

fn is_file_path_char(c: char) -> bool {
    is_file_name_char(c) || c == '/'
}

fn is_arg_char(c: char) -> bool {
    is_file_path_char(c)
}

fn is_md5_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, 'a'..='f')
}

fn describe_char(c: Option<char>) -> String {
    match c {
        Some(c) if c.is_ascii_graphic() || c == ' ' => format!("'{}'", c),
        Some(_) => "<unprintable>".to_string(),
        None => "end-of-file".to_string(),
    }
}

impl<'a> Lexer<'a> {
    /// Open the file's top-level fragment and advance to the first
    /// interesting token.
    pub fn new(file: &'a mut DefFile) -> Result<Self, Error> {
        let root = file.root_fragment();
        let root_path = file.fragment(root).path.clone();
        let mut lexer = Self {
            file,
            stack: Vec::new(),
        };
        lexer.push_context(root, &root_path)?;
        lexer.next_token()?;
        Ok(lexer)
    }

    pub fn file(&self) -> &DefFile {
        &*self.file
    }

    fn push_context(&mut self, fragment: FragmentId, file_path: &str) -> Result<(), Error> {
        if !system::file_exists(file_path) {
            return Err(Error::NotFound(file_path.to_string()));
        }
        let content = system::read_file(file_path)?;
        self.stack.push(Context {
            fragment,
            content,
            pos: 0,
            line: 1,
            column: 0,
        });
        Ok(())
    }

    fn top(&self) -> &Context {
        self.stack.last().expect("lexer context stack is never empty")
    }

    fn top_mut(&mut self) -> &mut Context {
        self.stack.last_mut().expect("lexer context stack is never empty")
    }

    fn next_char(&self) -> Option<char> {
        self.top().next_char()
    }

    /// The current position, for diagnostics.
    pub fn location(&self) -> Location {
        let top = self.top();
        Location::new(
            self.file.fragment(top.fragment).path.clone(),
            top.line,
            top.column,
        )
    }

    /// Build a LEX_ERROR at the current position.
    pub fn error<S: Into<String>>(&self, message: S) -> Error {
        Error::Lex(self.location(), message.into())
    }

    fn unexpected_char(&self, rest_of_message: &str) -> Error {
        self.error(format!(
            "Unexpected character {} {}",
            describe_char(self.next_char()),
            rest_of_message
        ))
    }

    /// Consume one character into a pending token's text.
    fn advance(&mut self, pending: &mut Pending) {
        let top = self.top_mut();
        if let Some(c) = top.next_char() {
            pending.text.push(c);
            top.pos += c.len_utf8();
            if c == '\n' {
                top.line += 1;
                top.column = 0;
            } else {
                top.column += 1;
            }
        }
    }

    fn start_token(&self, kind: TokenKind) -> Pending {
        let top = self.top();
        Pending {
            kind,
            text: String::new(),
            line: top.line,
            column: top.column,
            byte_offset: top.pos,
        }
    }

    fn finish_token(&mut self, pending: Pending) -> TokenId {
        let fragment = self.top().fragment;
        self.file.add_token(
            fragment,
            pending.kind,
            pending.text,
            pending.line,
            pending.column,
            pending.byte_offset,
        )
    }

    /// Check if the next run of text could match a given kind of token.
    /// Never consumes anything.
    pub fn is_match(&self, kind: TokenKind) -> bool {
        let next = self.next_char();
        match kind {
            TokenKind::EndOfFile => next.is_none(),
            TokenKind::OpenCurly => next == Some('{'),
            TokenKind::CloseCurly => next == Some('}'),
            TokenKind::OpenParen => next == Some('('),
            TokenKind::CloseParen => next == Some(')'),
            TokenKind::Colon => next == Some(':'),
            TokenKind::Equals => next == Some('='),
            TokenKind::Dot => next == Some('.'),
            TokenKind::Star => next == Some('*'),
            TokenKind::Arrow => next == Some('-') && self.top().second_char() == Some('>'),
            TokenKind::Whitespace => next.is_some_and(is_whitespace),
            TokenKind::Comment => {
                next == Some('/')
                    && matches!(self.top().second_char(), Some('/') | Some('*'))
            }
            TokenKind::FilePermissions
            | TokenKind::ServerIpcOption
            | TokenKind::ClientIpcOption => next == Some('['),
            TokenKind::Arg => {
                if next == Some('=') {
                    return true;
                }
                self.is_match(TokenKind::FilePath)
            }
            TokenKind::FilePath => {
                // A leading '/' could open a comment instead.
                if next == Some('/') {
                    return !matches!(self.top().second_char(), Some('/') | Some('*'));
                }
                self.is_match(TokenKind::FileName)
            }
            TokenKind::FileName => {
                next.is_some_and(is_file_name_char) || next == Some('\'') || next == Some('"')
            }
            TokenKind::IpcAgent => {
                next == Some('<') || next.is_some_and(is_name_start)
            }
            TokenKind::Name | TokenKind::GroupName | TokenKind::DottedName => {
                next.is_some_and(is_name_start)
            }
            TokenKind::Integer => next.is_some_and(|c| c.is_ascii_digit()),
            TokenKind::SignedInteger => {
                next == Some('+') || next == Some('-') || next.is_some_and(|c| c.is_ascii_digit())
            }
            TokenKind::Boolean => self.is_match_boolean(),
            TokenKind::Md5Hash => next.is_some_and(|c| c.is_ascii_hexdigit()),
            TokenKind::Directive => next == Some('#'),
            // No lookahead defined; only ever pulled directly.
            TokenKind::Float | TokenKind::String => false,
        }
    }

    fn is_match_boolean(&self) -> bool {
        let rest = self.top().rest();
        // Word boundary doesn't matter here; the original compares a
        // fixed-length lookahead the same way.
        rest.starts_with("true")
            || rest.starts_with("false")
            || rest.starts_with("on")
            || rest.starts_with("off")
    }

    /// Pull a token of the requested kind, then move to the start of the
    /// next semantically meaningful token.
    pub fn pull(&mut self, kind: TokenKind) -> Result<TokenId, Error> {
        let token = self.pull_raw(kind)?;
        self.next_token()?;
        Ok(token)
    }

    /// Pull a single token, leaving the point immediately after it.
    fn pull_raw(&mut self, kind: TokenKind) -> Result<TokenId, Error> {
        let mut pending = self.start_token(kind);
        match kind {
            TokenKind::EndOfFile => {
                if let Some(c) = self.next_char() {
                    return Err(self.error(format!(
                        "Expected end-of-file, but found '{}'.",
                        c
                    )));
                }
            }
            TokenKind::OpenCurly => self.pull_const(&mut pending, "{")?,
            TokenKind::CloseCurly => self.pull_const(&mut pending, "}")?,
            TokenKind::OpenParen => self.pull_const(&mut pending, "(")?,
            TokenKind::CloseParen => self.pull_const(&mut pending, ")")?,
            TokenKind::Colon => self.pull_const(&mut pending, ":")?,
            TokenKind::Equals => self.pull_const(&mut pending, "=")?,
            TokenKind::Dot => self.pull_const(&mut pending, ".")?,
            TokenKind::Star => self.pull_const(&mut pending, "*")?,
            TokenKind::Arrow => self.pull_const(&mut pending, "->")?,
            TokenKind::Whitespace => self.pull_whitespace(&mut pending)?,
            TokenKind::Comment => self.pull_comment(&mut pending)?,
            TokenKind::FilePermissions => self.pull_file_permissions(&mut pending)?,
            TokenKind::ServerIpcOption => {
                self.pull_ipc_option(&mut pending)?;
                if pending.text != "[manual-start]" && pending.text != "[async]" {
                    return Err(self.error(format!(
                        "Invalid server-side IPC option: '{}'",
                        pending.text
                    )));
                }
            }
            TokenKind::ClientIpcOption => {
                self.pull_ipc_option(&mut pending)?;
                if pending.text != "[manual-start]"
                    && pending.text != "[types-only]"
                    && pending.text != "[optional]"
                {
                    return Err(self.error(format!(
                        "Invalid client-side IPC option: '{}'",
                        pending.text
                    )));
                }
            }
            TokenKind::Arg => self.pull_path_like(&mut pending, is_arg_char, "argument")?,
            TokenKind::FilePath => {
                self.pull_path_like(&mut pending, is_file_path_char, "file path")?
            }
            TokenKind::FileName => self.pull_file_name(&mut pending)?,
            TokenKind::Name => self.pull_name(&mut pending)?,
            TokenKind::DottedName => self.pull_dotted_name(&mut pending)?,
            TokenKind::GroupName => self.pull_group_name(&mut pending)?,
            TokenKind::IpcAgent => self.pull_ipc_agent(&mut pending)?,
            TokenKind::Integer => self.pull_integer(&mut pending)?,
            TokenKind::SignedInteger => self.pull_signed_integer(&mut pending)?,
            TokenKind::Boolean => self.pull_boolean(&mut pending)?,
            TokenKind::Float => self.pull_float(&mut pending)?,
            TokenKind::String => self.pull_string(&mut pending)?,
            TokenKind::Md5Hash => self.pull_md5(&mut pending)?,
            TokenKind::Directive => self.pull_directive(&mut pending)?,
        }
        Ok(self.finish_token(pending))
    }

    /// Skip whitespace, comments and directives so that pull() returns
    /// semantically meaningful tokens only.  Pops an include context when an
    /// included file runs out.
    fn next_token(&mut self) -> Result<(), Error> {
        loop {
            if self.is_match(TokenKind::Whitespace) {
                self.pull_raw(TokenKind::Whitespace)?;
            } else if self.is_match(TokenKind::Comment) {
                self.pull_raw(TokenKind::Comment)?;
            } else if self.is_match(TokenKind::Directive) {
                self.process_directive()?;
            } else if self.is_match(TokenKind::EndOfFile) {
                if self.stack.len() > 1 {
                    self.pull_raw(TokenKind::EndOfFile)?;
                    self.stack.pop();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn process_directive(&mut self) -> Result<(), Error> {
        let directive = self.pull_raw(TokenKind::Directive)?;

        if self.is_match(TokenKind::Whitespace) {
            self.pull_raw(TokenKind::Whitespace)?;
        }

        if self.file.token_text(directive) == "#include" {
            self.process_include_directive()
        } else {
            Err(self.error(format!(
                "Unrecognized processing directive '{}'",
                self.file.token_text(directive)
            )))
        }
    }

    fn process_include_directive(&mut self) -> Result<(), Error> {
        let include_token = self.pull_raw(TokenKind::FilePath)?;
        let raw_path = self.file.token_text(include_token).to_string();

        let mut substituted_vars = BTreeSet::new();
        let file_path = match envvars::do_substitution_tracked(&raw_path, &mut substituted_vars) {
            Ok(text) => path::unquote(&text),
            Err(e) => {
                return Err(Error::Lex(self.file.location(include_token), e.to_string()));
            }
        };

        for var in substituted_vars {
            self.file.record_var_use(&var, include_token);
        }

        // Resolve relative to the including file's directory first, then
        // LEGATO_ROOT.
        let cur_fragment = self.top().fragment;
        let cur_dir = path::get_containing_dir(&self.file.fragment(cur_fragment).path);
        let include_path = system::find_file(&file_path, &[cur_dir])
            .or_else(|| system::find_file(&file_path, &[envvars::get("LEGATO_ROOT")]));

        let include_path = match include_path {
            Some(p) => path::to_string(&p),
            None => {
                return Err(Error::Lex(
                    self.file.location(include_token),
                    format!("File '{}' not found.", file_path),
                ));
            }
        };

        let fragment = self.file.add_fragment(&include_path);
        self.file.fragments[cur_fragment.0 as usize]
            .included
            .push((include_token, fragment));
        self.push_context(fragment, &include_path)
    }

    fn pull_const(&mut self, pending: &mut Pending, token_string: &str) -> Result<(), Error> {
        for expected in token_string.chars() {
            if self.next_char() != Some(expected) {
                return Err(self.unexpected_char(&format!(". Expected '{}'", token_string)));
            }
            self.advance(pending);
        }
        Ok(())
    }

    fn pull_whitespace(&mut self, pending: &mut Pending) -> Result<(), Error> {
        while self.next_char().is_some_and(is_whitespace) {
            self.advance(pending);
        }
        if pending.text.is_empty() {
            return Err(self.error("Expected whitespace."));
        }
        Ok(())
    }

    fn pull_comment(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if self.next_char() != Some('/') {
            return Err(self.error("Expected '/' at start of comment."));
        }
        self.advance(pending);

        match self.next_char() {
            Some('/') => {
                // C++ style, runs to end of line or file.
                self.advance(pending);
                while !matches!(self.next_char(), Some('\n') | None) {
                    self.advance(pending);
                }
                Ok(())
            }
            Some('*') => {
                // C style, terminated by "*/".
                self.advance(pending);
                loop {
                    match self.next_char() {
                        Some('*') => {
                            self.advance(pending);
                            if self.next_char() == Some('/') {
                                self.advance(pending);
                                return Ok(());
                            }
                        }
                        Some(_) => self.advance(pending),
                        None => {
                            let start = Location::new(
                                self.file.fragment(self.top().fragment).path.clone(),
                                pending.line,
                                pending.column,
                            );
                            return Err(self.error(format!(
                                "Unexpected end-of-file before end of comment.\n\
                                 {}: note: Comment starts here.",
                                start
                            )));
                        }
                    }
                }
            }
            _ => Err(self.error("Expected '/' or '*' at start of comment.")),
        }
    }

    fn pull_file_permissions(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if self.next_char() != Some('[') {
            return Err(self.error("Expected '[' at start of file permissions."));
        }
        self.advance(pending);

        if self.next_char() == Some(']') {
            return Err(self.error("Empty file permissions."));
        }

        loop {
            match self.next_char() {
                None => {
                    return Err(
                        self.error("Unexpected end-of-file before end of file permissions.")
                    );
                }
                Some('r') | Some('w') | Some('x') => self.advance(pending),
                Some(']') => break,
                Some(_) => {
                    return Err(self.unexpected_char("inside file permissions."));
                }
            }
        }
        self.advance(pending); // trailing ']'
        Ok(())
    }

    fn pull_ipc_option(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if self.next_char() != Some('[') {
            return Err(self.error("Expected '[' at start of IPC option."));
        }
        self.advance(pending);

        if self.next_char() == Some(']') {
            return Err(self.error("Empty IPC option."));
        }

        loop {
            match self.next_char() {
                None => {
                    return Err(self.error("Unexpected end-of-file before end of IPC option."));
                }
                Some(']') => break,
                Some(c) if c == '-' || c.is_ascii_lowercase() => self.advance(pending),
                Some(_) => return Err(self.unexpected_char("inside option.")),
            }
        }
        self.advance(pending); // trailing ']'
        Ok(())
    }

    /// FILE_PATH and ARG share their scanning shape: optionally quoted, with
    /// embedded environment references kept verbatim and a '/' only accepted
    /// when it doesn't open a comment.
    fn pull_path_like(
        &mut self,
        pending: &mut Pending,
        is_wanted: fn(char) -> bool,
        what: &str,
    ) -> Result<(), Error> {
        match self.next_char() {
            Some('"') => return self.pull_quoted(pending, '"'),
            Some('\'') => return self.pull_quoted(pending, '\''),
            _ => {}
        }

        while self.next_char().is_some_and(is_wanted) {
            if self.next_char() == Some('$') {
                self.pull_env_var(pending)?;
            } else {
                if self.next_char() == Some('/')
                    && matches!(self.top().second_char(), Some('/') | Some('*'))
                {
                    break;
                }
                self.advance(pending);
            }
        }

        if pending.text.is_empty() {
            return Err(match self.next_char() {
                Some(c) if c.is_ascii_graphic() => {
                    self.error(format!("Invalid character '{}' in {}.", c, what))
                }
                _ => self.error(format!("Invalid (non-printable) character in {}.", what)),
            });
        }
        Ok(())
    }

    fn pull_file_name(&mut self, pending: &mut Pending) -> Result<(), Error> {
        match self.next_char() {
            Some('"') => return self.pull_quoted(pending, '"'),
            Some('\'') => return self.pull_quoted(pending, '\''),
            _ => {}
        }

        while self.next_char().is_some_and(is_file_name_char) {
            if self.next_char() == Some('$') {
                self.pull_env_var(pending)?;
            } else {
                self.advance(pending);
            }
        }

        if pending.text.is_empty() {
            return Err(match self.next_char() {
                Some(c) if c.is_ascii_graphic() => {
                    self.error(format!("Invalid character '{}' in name.", c))
                }
                _ => self.error("Invalid (non-printable) character in name.".to_string()),
            });
        }
        Ok(())
    }

    fn pull_name(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if self.next_char().is_some_and(is_name_start) {
            self.advance(pending);
        } else {
            return Err(self.unexpected_char(
                "at beginning of name. Names must start with a letter ('a'-'z' or 'A'-'Z') \
                 or an underscore ('_').",
            ));
        }
        while self.next_char().is_some_and(is_name_continue) {
            self.advance(pending);
        }
        Ok(())
    }

    fn pull_dotted_name(&mut self, pending: &mut Pending) -> Result<(), Error> {
        loop {
            self.pull_name(pending)?;
            if self.next_char() == Some('.') {
                self.advance(pending);
            }
            if !self.next_char().is_some_and(is_name_start) {
                break;
            }
        }
        Ok(())
    }

    fn pull_group_name(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if self.next_char().is_some_and(is_name_start) {
            self.advance(pending);
        } else {
            return Err(self.unexpected_char(
                "at beginning of group name. Group names must start with a letter \
                 ('a'-'z' or 'A'-'Z') or an underscore ('_').",
            ));
        }
        while self
            .next_char()
            .is_some_and(|c| is_name_continue(c) || c == '-')
        {
            self.advance(pending);
        }
        Ok(())
    }

    fn pull_ipc_agent(&mut self, pending: &mut Pending) -> Result<(), Error> {
        match self.next_char() {
            // User names are in angle brackets: <username>
            Some('<') => {
                self.advance(pending);
                while self
                    .next_char()
                    .is_some_and(|c| is_name_continue(c) || c == '-')
                {
                    self.advance(pending);
                }
                if self.next_char() != Some('>') {
                    return Err(self.unexpected_char(
                        "in user name.  Must be terminated with '>'.",
                    ));
                }
                self.advance(pending);
                Ok(())
            }
            // App names follow C identifier rules.
            Some(c) if is_name_start(c) => {
                self.advance(pending);
                while self.next_char().is_some_and(is_name_continue) {
                    self.advance(pending);
                }
                Ok(())
            }
            _ => Err(self.unexpected_char(
                "at beginning of IPC agent name. App names must start with a letter \
                 ('a'-'z' or 'A'-'Z') or an underscore ('_').  User names must be inside \
                 angle brackets ('<username>').",
            )),
        }
    }

    fn pull_integer(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if !self.next_char().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.unexpected_char("at beginning of integer."));
        }
        while self.next_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(pending);
        }
        // Optional 'K' (x 1024) suffix.
        if self.next_char() == Some('K') {
            self.advance(pending);
        }
        Ok(())
    }

    fn pull_signed_integer(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if matches!(self.next_char(), Some('+') | Some('-')) {
            self.advance(pending);
        }
        self.pull_integer(pending)
    }

    fn pull_boolean(&mut self, pending: &mut Pending) -> Result<(), Error> {
        match self.next_char() {
            Some('t') => self.pull_const(pending, "true"),
            Some('f') => self.pull_const(pending, "false"),
            Some('o') => {
                self.advance(pending);
                match self.next_char() {
                    Some('n') => {
                        self.advance(pending);
                        Ok(())
                    }
                    Some('f') => {
                        self.advance(pending);
                        if self.next_char() != Some('f') {
                            return Err(self.error(
                                "Unexpected boolean value.  Only 'true', 'false', 'on', or \
                                 'off' allowed.",
                            ));
                        }
                        self.advance(pending);
                        Ok(())
                    }
                    _ => Err(self.error(
                        "Unexpected boolean value.  Only 'true', 'false', 'on', or 'off' \
                         allowed.",
                    )),
                }
            }
            _ => Err(self.unexpected_char(
                "at beginning of boolean value.  Only 'true', 'false', 'on', or 'off' \
                 allowed.",
            )),
        }
    }

    fn pull_float(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if !self
            .next_char()
            .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            return Err(self.unexpected_char("at beginning of floating point value."));
        }
        self.advance(pending);

        while self.next_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(pending);
        }

        if self.next_char() == Some('.') {
            self.advance(pending);
            while self.next_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance(pending);
            }
        }

        if matches!(self.next_char(), Some('e') | Some('E')) {
            self.advance(pending);
            if !self
                .next_char()
                .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
            {
                return Err(
                    self.unexpected_char("in exponent part of floating point value.")
                );
            }
            self.advance(pending);
            while self.next_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance(pending);
            }
        }
        Ok(())
    }

    fn pull_string(&mut self, pending: &mut Pending) -> Result<(), Error> {
        match self.next_char() {
            Some(q @ ('"' | '\'')) => self.pull_quoted(pending, q),
            _ => Err(self.error("Expected string literal.")),
        }
    }

    /// Pull everything up to and including the closing quote.  The opening
    /// quote fixes the terminator; a newline inside the string is fatal.
    fn pull_quoted(&mut self, pending: &mut Pending, quote_char: char) -> Result<(), Error> {
        self.advance(pending); // opening quote

        loop {
            match self.next_char() {
                None => {
                    return Err(
                        self.error("Unexpected end-of-file before end of quoted string.")
                    );
                }
                Some('\n') | Some('\r') => {
                    return Err(
                        self.error("Unexpected end-of-line before end of quoted string.")
                    );
                }
                Some(c) if c == quote_char => {
                    self.advance(pending); // closing quote
                    return Ok(());
                }
                Some(_) => self.advance(pending),
            }
        }
    }

    /// Pull a `$NAME` or `${NAME}` reference into the token verbatim.
    /// Substitution is not done here so the token text keeps the exact
    /// spelling from the file.
    fn pull_env_var(&mut self, pending: &mut Pending) -> Result<(), Error> {
        self.advance(pending); // '$'

        let has_curlies = self.next_char() == Some('{');
        if has_curlies {
            self.advance(pending);
        }

        if self.next_char().is_some_and(is_name_start) {
            self.advance(pending);
        } else {
            return Err(self.unexpected_char(
                "at beginning of environment variable name.  Must start with a letter \
                 ('a'-'z' or 'A'-'Z') or an underscore ('_').",
            ));
        }
        while self.next_char().is_some_and(is_name_continue) {
            self.advance(pending);
        }

        if has_curlies {
            match self.next_char() {
                Some('}') => self.advance(pending),
                None => {
                    return Err(self.error(
                        "Unexpected end-of-file inside environment variable name.",
                    ));
                }
                Some(c) => {
                    return Err(self.error(format!("'}}' expected.  '{}' found.", c)));
                }
            }
        }
        Ok(())
    }

    fn pull_md5(&mut self, pending: &mut Pending) -> Result<(), Error> {
        // Always exactly 32 lower-case hexadecimal digits.
        for _ in 0..32 {
            match self.next_char() {
                Some(c) if is_md5_char(c) => self.advance(pending),
                Some(c) if is_whitespace(c) => {
                    return Err(self.error("MD5 hash too short."));
                }
                _ => return Err(self.unexpected_char("in MD5 hash.")),
            }
        }
        if self.next_char().is_some_and(is_md5_char) {
            return Err(self.error("MD5 hash too long."));
        }
        Ok(())
    }

    fn pull_directive(&mut self, pending: &mut Pending) -> Result<(), Error> {
        if self.next_char() == Some('#') {
            self.advance(pending);
        } else {
            return Err(self.unexpected_char(
                "at beginning of processing directive.  Must start with '#' character.",
            ));
        }

        if self.next_char().is_some_and(is_letter) {
            self.advance(pending);
        } else {
            return Err(self.unexpected_char(
                "at beginning of processing directive.  Must start with a letter \
                 ('a'-'z' or 'A'-'Z').",
            ));
        }
        while self.next_char().is_some_and(is_letter) {
            self.advance(pending);
        }
        Ok(())
    }

    /// Re-tag a token (typically a FILE_PATH) as a NAME after checking its
    /// spelling against the stricter NAME grammar.
    pub fn convert_to_name(&mut self, token: TokenId) -> Result<(), Error> {
        let text = self.file.token_text(token);

        let mut chars = text.chars();
        match chars.next() {
            Some(c) if is_name_start(c) => {}
            first => {
                return Err(Error::Lex(
                    self.file.location(token),
                    format!(
                        "Unexpected character {} at beginning of name. Names must start \
                         with a letter ('a'-'z' or 'A'-'Z') or an underscore ('_').",
                        describe_char(first)
                    ),
                ));
            }
        }
        for c in chars {
            if !is_name_continue(c) {
                return Err(Error::Lex(
                    self.file.location(token),
                    format!(
                        "Unexpected character '{}'.  Names may only contain letters \
                         ('a'-'z' or 'A'-'Z'), numbers ('0'-'9') and underscores ('_').",
                        c
                    ),
                ));
            }
        }

        self.file.tokens[token.0 as usize].kind = TokenKind::Name;
        Ok(())
    }

    /// Re-tag a token as a DOTTED_NAME after checking its spelling: NAMEs
    /// joined by single dots.
    pub fn convert_to_dotted_name(&mut self, token: TokenId) -> Result<(), Error> {
        let text = self.file.token_text(token);

        let mut previous_was_dot = true; // a leading dot is also invalid
        for c in text.chars() {
            if c == '.' {
                if previous_was_dot {
                    return Err(Error::Lex(
                        self.file.location(token),
                        format!("'{}' is not a valid dotted name.", text),
                    ));
                }
                previous_was_dot = true;
            } else if (previous_was_dot && is_name_start(c))
                || (!previous_was_dot && is_name_continue(c))
            {
                previous_was_dot = false;
            } else {
                return Err(Error::Lex(
                    self.file.location(token),
                    format!("'{}' is not a valid dotted name.", text),
                ));
            }
        }
        if previous_was_dot {
            return Err(Error::Lex(
                self.file.location(token),
                format!("'{}' is not a valid dotted name.", text),
            ));
        }

        self.file.tokens[token.0 as usize].kind = TokenKind::DottedName;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_tree::DefFileKind;
    use std::io::Write;

    fn lex_fixture(content: &str) -> (tempfile::TempDir, DefFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cdef");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        let file = DefFile::new(DefFileKind::Cdef, &path.display().to_string());
        (dir, file)
    }

    #[test]
    fn pulls_basic_tokens() {
        let (_dir, mut file) = lex_fixture("sources:\n{\n    foo.c\n}\n");
        let mut lexer = Lexer::new(&mut file).unwrap();

        let name = lexer.pull(TokenKind::Name).unwrap();
        lexer.pull(TokenKind::Colon).unwrap();
        lexer.pull(TokenKind::OpenCurly).unwrap();
        let src = lexer.pull(TokenKind::FilePath).unwrap();
        lexer.pull(TokenKind::CloseCurly).unwrap();
        assert!(lexer.is_match(TokenKind::EndOfFile));

        assert_eq!(file.token_text(name), "sources");
        assert_eq!(file.token_text(src), "foo.c");
    }

    #[test]
    fn comments_and_whitespace_are_kept_but_skipped() {
        let (_dir, mut file) = lex_fixture("// hi\n/* there */ name");
        let mut lexer = Lexer::new(&mut file).unwrap();
        let name = lexer.pull(TokenKind::Name).unwrap();
        assert_eq!(file.token_text(name), "name");

        let kinds: Vec<TokenKind> = file.tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::Comment));
        assert!(kinds.contains(&TokenKind::Whitespace));
    }

    #[test]
    fn unterminated_block_comment_reports_start() {
        let (_dir, mut file) = lex_fixture("/* never ends");
        let err = Lexer::new(&mut file).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("before end of comment"), "{}", message);
        assert!(message.contains("Comment starts here"), "{}", message);
    }

    #[test]
    fn newline_inside_string_is_fatal() {
        let (_dir, mut file) = lex_fixture("\"broken\nstring\"");
        let mut lexer = Lexer::new(&mut file).unwrap();
        let err = lexer.pull(TokenKind::String).unwrap_err();
        assert!(err.to_string().contains("end-of-line"), "{}", err);
    }

    #[test]
    fn either_quote_style_works() {
        let (_dir, mut file) = lex_fixture("'it \"works\"'");
        let mut lexer = Lexer::new(&mut file).unwrap();
        let tok = lexer.pull(TokenKind::String).unwrap();
        assert_eq!(file.token_text(tok), "'it \"works\"'");
    }

    #[test]
    fn slash_starts_a_path_unless_comment() {
        let (_dir, mut file) = lex_fixture("/usr/bin/thing");
        let mut lexer = Lexer::new(&mut file).unwrap();
        assert!(lexer.is_match(TokenKind::FilePath));
        let tok = lexer.pull(TokenKind::FilePath).unwrap();
        assert_eq!(file.token_text(tok), "/usr/bin/thing");
    }

    #[test]
    fn env_refs_are_kept_verbatim_in_tokens() {
        let (_dir, mut file) = lex_fixture("${SOME_DIR}/file.c");
        let mut lexer = Lexer::new(&mut file).unwrap();
        let tok = lexer.pull(TokenKind::FilePath).unwrap();
        assert_eq!(file.token_text(tok), "${SOME_DIR}/file.c");
    }

    #[test]
    fn integer_accepts_k_suffix() {
        let (_dir, mut file) = lex_fixture("128K");
        let mut lexer = Lexer::new(&mut file).unwrap();
        let tok = lexer.pull(TokenKind::Integer).unwrap();
        assert_eq!(file.token_text(tok), "128K");
    }

    #[test]
    fn ipc_agent_forms() {
        let (_dir, mut file) = lex_fixture("<root> someApp");
        let mut lexer = Lexer::new(&mut file).unwrap();
        let user = lexer.pull(TokenKind::IpcAgent).unwrap();
        let app = lexer.pull(TokenKind::IpcAgent).unwrap();
        assert_eq!(file.token_text(user), "<root>");
        assert_eq!(file.token_text(app), "someApp");
    }

    #[test]
    fn convert_to_name_enforces_name_grammar() {
        let (_dir, mut file) = lex_fixture("good_name bad.name");
        let mut lexer = Lexer::new(&mut file).unwrap();

        let good = lexer.pull(TokenKind::FilePath).unwrap();
        lexer.convert_to_name(good).unwrap();
        assert_eq!(file.token(good).kind, TokenKind::Name);

        let mut lexer = Lexer::new(&mut file).unwrap();
        lexer.pull(TokenKind::FilePath).unwrap();
        let bad = lexer.pull(TokenKind::FilePath).unwrap();
        assert!(lexer.convert_to_name(bad).is_err());
    }

    #[test]
    fn include_pushes_a_fragment_and_records_vars() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.cdef"), "inner").unwrap();
        let main_path = dir.path().join("a.cdef");
        std::fs::write(&main_path, "#include \"${MKTOOLS_TEST_OTHER}/b.cdef\"\nouter").unwrap();

        std::env::set_var("MKTOOLS_TEST_OTHER", "sub");

        let mut file = DefFile::new(DefFileKind::Cdef, &main_path.display().to_string());
        let mut lexer = Lexer::new(&mut file).unwrap();

        // The first meaningful token comes from the included fragment.
        let inner = lexer.pull(TokenKind::Name).unwrap();
        let outer = lexer.pull(TokenKind::Name).unwrap();
        assert_eq!(file.token_text(inner), "inner");
        assert_eq!(file.token_text(outer), "outer");
        assert_ne!(file.token(inner).fragment, file.token(outer).fragment);

        assert_eq!(file.fragments.len(), 2);
        assert!(file.find_var_use("MKTOOLS_TEST_OTHER").is_some());
    }

    #[test]
    fn missing_include_is_fatal() {
        let (_dir, mut file) = lex_fixture("#include \"nope.cdef\"\n");
        let err = Lexer::new(&mut file).unwrap_err();
        assert!(err.to_string().contains("not found"), "{}", err);
    }
}
