//! Definition-file parse trees
//!
//! A parsed definition file owns one token arena shared by all of its file
//! fragments (the top-level file plus everything it `#include`s).  Tokens are
//! referenced by [TokenId] handles; within one fragment they also form a
//! doubly-linked list in file order so the edit subsystem can walk
//! neighbouring tokens and recover exact byte ranges.

use std::collections::BTreeMap;

use crate::system::{Error, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    EndOfFile,
    OpenCurly,
    CloseCurly,
    OpenParen,
    CloseParen,
    Colon,
    Equals,
    Dot,
    Star,
    Arrow,
    Whitespace,
    Comment,
    FilePermissions,
    ServerIpcOption,
    ClientIpcOption,
    Arg,
    FilePath,
    FileName,
    Name,
    DottedName,
    GroupName,
    IpcAgent,
    Integer,
    SignedInteger,
    Boolean,
    Float,
    String,
    Md5Hash,
    Directive,
}

impl TokenKind {
    /// Human-readable name, used in "expected X" diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            TokenKind::EndOfFile => "end-of-file",
            TokenKind::OpenCurly => "{",
            TokenKind::CloseCurly => "}",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::Colon => ":",
            TokenKind::Equals => "=",
            TokenKind::Dot => ".",
            TokenKind::Star => "*",
            TokenKind::Arrow => "->",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Comment => "comment",
            TokenKind::FilePermissions => "file permissions",
            TokenKind::ServerIpcOption => "server-side IPC option",
            TokenKind::ClientIpcOption => "client-side IPC option",
            TokenKind::Arg => "argument",
            TokenKind::FilePath => "file path",
            TokenKind::FileName => "file name",
            TokenKind::Name => "name",
            TokenKind::DottedName => "dotted name",
            TokenKind::GroupName => "group name",
            TokenKind::IpcAgent => "IPC agent",
            TokenKind::Integer => "integer",
            TokenKind::SignedInteger => "signed integer",
            TokenKind::Boolean => "Boolean value",
            TokenKind::Float => "floating point value",
            TokenKind::String => "string literal",
            TokenKind::Md5Hash => "MD5 hash",
            TokenKind::Directive => "processing directive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentId(pub u32);

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub fragment: FragmentId,
    pub line: usize,
    pub column: usize,
    /// Byte offset of the token's first character within its fragment's file.
    pub byte_offset: usize,
    pub prev: Option<TokenId>,
    pub next: Option<TokenId>,
}

impl Token {
    /// Byte offset one past the token's last character.
    pub fn end_offset(&self) -> usize {
        self.byte_offset + self.text.len()
    }
}

/// One lexed file: the top-level definition file or an included file.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub path: String,
    pub first_token: Option<TokenId>,
    pub last_token: Option<TokenId>,
    /// Include-path token in this fragment -> the fragment it pulled in.
    pub included: Vec<(TokenId, FragmentId)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefFileKind {
    Adef,
    Cdef,
    Sdef,
    Mdef,
}

impl DefFileKind {
    pub fn extension(self) -> &'static str {
        match self {
            DefFileKind::Adef => ".adef",
            DefFileKind::Cdef => ".cdef",
            DefFileKind::Sdef => ".sdef",
            DefFileKind::Mdef => ".mdef",
        }
    }
}

/// Kinds of token-list parse tree items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// `name: value`
    SimpleSection,
    /// `name: { token token ... }`
    TokenListSection,
    Executable,
    RunProcess,
    EnvVar,
    Binding,
    Command,
    ModuleParam,
    Pool,
    RequiredApi,
    ProvidedApi,
    RequiredFile,
    RequiredDir,
    RequiredDevice,
    RequiredConfigTree,
    BundledFile,
    BundledDir,
    ExternApiInterface,
    AssetSetting,
    AssetVariable,
    AssetCommand,
}

/// A parse tree item whose contents are plain tokens.
#[derive(Debug, Clone)]
pub struct TokenListItem {
    pub kind: ItemKind,
    pub first: TokenId,
    pub last: TokenId,
    pub contents: Vec<TokenId>,
}

/// What a [ComplexItem] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexKind {
    /// A named section or subsection containing child items.
    Section,
    /// An `apps:` entry: .adef path plus optional override sections.
    App,
    /// An `assets:` entry: asset name plus field subsections.
    Asset,
}

/// A parse tree item whose contents are themselves items.
#[derive(Debug, Clone)]
pub struct ComplexItem {
    pub kind: ComplexKind,
    /// Section name / app file path / asset name token.
    pub name: TokenId,
    pub first: TokenId,
    pub last: TokenId,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Tokens(TokenListItem),
    Complex(ComplexItem),
}

impl Item {
    pub fn first(&self) -> TokenId {
        match self {
            Item::Tokens(item) => item.first,
            Item::Complex(item) => item.first,
        }
    }

    pub fn last(&self) -> TokenId {
        match self {
            Item::Tokens(item) => item.last,
            Item::Complex(item) => item.last,
        }
    }

    /// The token naming this item (the section keyword for sections).
    pub fn name_token(&self) -> TokenId {
        match self {
            Item::Tokens(item) => item.first,
            Item::Complex(item) => item.name,
        }
    }

    pub fn as_tokens(&self) -> Option<&TokenListItem> {
        match self {
            Item::Tokens(item) => Some(item),
            Item::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexItem> {
        match self {
            Item::Tokens(_) => None,
            Item::Complex(item) => Some(item),
        }
    }
}

/// A fully lexed and parsed definition file.
#[derive(Debug)]
pub struct DefFile {
    pub kind: DefFileKind,
    pub tokens: Vec<Token>,
    /// Fragment 0 is the top-level file; the rest were included.
    pub fragments: Vec<Fragment>,
    pub sections: Vec<Item>,
    /// Environment variables substituted while lexing, each mapped to the
    /// first token whose processing used it.
    pub used_vars: BTreeMap<String, TokenId>,
}

impl DefFile {
    pub fn new(kind: DefFileKind, path: &str) -> Self {
        Self {
            kind,
            tokens: Vec::new(),
            fragments: vec![Fragment {
                path: path.to_string(),
                first_token: None,
                last_token: None,
                included: Vec::new(),
            }],
            sections: Vec::new(),
            used_vars: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.fragments[0].path
    }

    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id.0 as usize]
    }

    pub fn token_text(&self, id: TokenId) -> &str {
        &self.token(id).text
    }

    pub fn fragment(&self, id: FragmentId) -> &Fragment {
        &self.fragments[id.0 as usize]
    }

    pub fn root_fragment(&self) -> FragmentId {
        FragmentId(0)
    }

    pub fn add_fragment(&mut self, path: &str) -> FragmentId {
        let id = FragmentId(self.fragments.len() as u32);
        self.fragments.push(Fragment {
            path: path.to_string(),
            first_token: None,
            last_token: None,
            included: Vec::new(),
        });
        id
    }

    /// Append a token to the arena and link it onto its fragment's list.
    pub fn add_token(
        &mut self,
        fragment: FragmentId,
        kind: TokenKind,
        text: String,
        line: usize,
        column: usize,
        byte_offset: usize,
    ) -> TokenId {
        let id = TokenId(self.tokens.len() as u32);
        let prev = self.fragments[fragment.0 as usize].last_token;
        self.tokens.push(Token {
            kind,
            text,
            fragment,
            line,
            column,
            byte_offset,
            prev,
            next: None,
        });
        let frag = &mut self.fragments[fragment.0 as usize];
        if frag.first_token.is_none() {
            frag.first_token = Some(id);
        }
        frag.last_token = Some(id);
        if let Some(prev_id) = prev {
            self.tokens[prev_id.0 as usize].next = Some(id);
        }
        id
    }

    /// Record that lexing substituted an environment variable while
    /// processing a given token.  The first use wins, matching the
    /// incremental-invalidation queries.
    pub fn record_var_use(&mut self, name: &str, token: TokenId) {
        self.used_vars
            .entry(name.to_string())
            .or_insert(token);
    }

    /// The first token in which a variable was used, if any.
    pub fn find_var_use(&self, name: &str) -> Option<TokenId> {
        self.used_vars.get(name).copied()
    }

    pub fn location(&self, id: TokenId) -> Location {
        let token = self.token(id);
        Location::new(
            self.fragment(token.fragment).path.clone(),
            token.line,
            token.column,
        )
    }

    /// Build a PARSE_ERROR (or modelling-time) diagnostic anchored at a
    /// token, compiler style.
    pub fn error_at<S: Into<String>>(&self, id: TokenId, message: S) -> Error {
        Error::Parse(self.location(id), message.into())
    }

    /// Same, but with the MODEL_ERROR flavour.
    pub fn model_error_at<S: Into<String>>(&self, id: TokenId, message: S) -> Error {
        Error::Model(self.location(id), message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_link_in_file_order() {
        let mut file = DefFile::new(DefFileKind::Cdef, "test.cdef");
        let frag = file.root_fragment();
        let a = file.add_token(frag, TokenKind::Name, "a".into(), 1, 0, 0);
        let b = file.add_token(frag, TokenKind::Colon, ":".into(), 1, 1, 1);
        let c = file.add_token(frag, TokenKind::EndOfFile, "".into(), 1, 2, 2);

        assert_eq!(file.fragment(frag).first_token, Some(a));
        assert_eq!(file.fragment(frag).last_token, Some(c));
        assert_eq!(file.token(a).next, Some(b));
        assert_eq!(file.token(b).prev, Some(a));
        assert_eq!(file.token(b).next, Some(c));
        assert_eq!(file.token(c).next, None);

        // Walking `next` from the fragment head reaches every token once.
        let mut seen = Vec::new();
        let mut cursor = file.fragment(frag).first_token;
        while let Some(id) = cursor {
            seen.push(id);
            cursor = file.token(id).next;
        }
        assert_eq!(seen, vec![a, b, c]);
    }

    #[test]
    fn included_fragments_keep_their_own_chain() {
        let mut file = DefFile::new(DefFileKind::Sdef, "sys.sdef");
        let root = file.root_fragment();
        let inc_tok = file.add_token(root, TokenKind::FilePath, "other.sdef".into(), 2, 10, 15);
        let frag = file.add_fragment("other.sdef");
        file.fragments[root.0 as usize].included.push((inc_tok, frag));

        let t = file.add_token(frag, TokenKind::Name, "apps".into(), 1, 0, 0);
        assert_eq!(file.fragment(frag).first_token, Some(t));
        assert_eq!(file.token(t).prev, None);
    }
}
