//! String-level path helpers for definition-file processing
//!
//! These operate on the textual form of paths as they appear in definition
//! files, independent of what exists on disk.

use std::path::Path;

/// Join two path fragments with exactly one separator between them.
pub fn combine(base: &str, node: &str) -> String {
    if base.is_empty() {
        return node.to_string();
    }
    if node.is_empty() {
        return base.to_string();
    }
    match (base.ends_with('/'), node.starts_with('/')) {
        (true, true) => format!("{}{}", base, &node[1..]),
        (false, false) => format!("{}/{}", base, node),
        _ => format!("{}{}", base, node),
    }
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Everything up to (but not including) the last '/' of a path.
pub fn get_containing_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => path[..i].to_string(),
        None => ".".to_string(),
    }
}

/// The last path node (file or directory name).
pub fn get_last_node(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[i + 1..].to_string(),
        None => path.to_string(),
    }
}

pub fn has_suffix(path: &str, suffix: &str) -> bool {
    path.ends_with(suffix)
}

pub fn remove_suffix(path: &str, suffix: &str) -> String {
    match path.strip_suffix(suffix) {
        Some(stripped) => stripped.to_string(),
        None => path.to_string(),
    }
}

/// Strip one level of matched single or double quotes, if present.
pub fn unquote(text: &str) -> String {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return text[1..text.len() - 1].to_string();
        }
    }
    text.to_string()
}

/// Escape double quotes for embedding in a quoted config value.
pub fn escape_quotes(text: &str) -> String {
    text.replace('"', "\\\"")
}

/// Lexically normalize a path: collapse `//`, drop `.` nodes and resolve
/// `..` nodes where possible.  Does not touch the file system, so the result
/// is stable and the function is idempotent.
pub fn minimize(path: &str) -> String {
    let absolute = is_absolute(path);
    let mut nodes: Vec<&str> = Vec::new();
    for node in path.split('/') {
        match node {
            "" | "." => {}
            ".." => {
                // Only pop a real name; a leading run of ".." must survive
                // on relative paths.
                if matches!(nodes.last(), Some(&last) if last != "..") {
                    nodes.pop();
                } else if !absolute {
                    nodes.push("..");
                }
            }
            _ => nodes.push(node),
        }
    }
    let joined = nodes.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Make a path absolute (relative to the current working directory) and
/// lexically normalize it.  Idempotent.
pub fn make_absolute(path: &str) -> String {
    if is_absolute(path) {
        return minimize(path);
    }
    let cwd = std::env::current_dir().unwrap_or_default();
    minimize(&combine(&cwd.display().to_string(), path))
}

/// The canonical form of a path, used as the interning key for .api files
/// and component directories.  Paths that exist resolve through the file
/// system (so symlinked directories intern to one object); the rest
/// normalize lexically.  Idempotent either way.
pub fn make_canonical(path: &str) -> String {
    use crate::system::PathExt;

    match path.canonicalize2() {
        Ok(canonical) => to_string(&canonical),
        Err(_) => make_absolute(path),
    }
}

pub fn is_c_source(path: &str) -> bool {
    has_suffix(path, ".c")
}

pub fn is_cxx_source(path: &str) -> bool {
    [".cpp", ".cc", ".cxx"].iter().any(|s| has_suffix(path, s))
}

pub fn is_java_source(path: &str) -> bool {
    has_suffix(path, ".java")
}

pub fn is_python_source(path: &str) -> bool {
    has_suffix(path, ".py")
}

pub fn is_shared_library(path: &str) -> bool {
    let name = get_last_node(path);
    name.starts_with("lib") && (name.ends_with(".so") || name.contains(".so."))
}

/// Convert an arbitrary name into a valid C identifier by replacing every
/// character that is not a letter, digit or underscore with an underscore.
pub fn get_identifier_safe_name(name: &str) -> String {
    let mut result: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

/// Convert a path known to be utf-8 into its textual form.
pub fn to_string(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_handles_separators() {
        assert_eq!(combine("a", "b"), "a/b");
        assert_eq!(combine("a/", "b"), "a/b");
        assert_eq!(combine("a/", "/b"), "a/b");
        assert_eq!(combine("", "b"), "b");
    }

    #[test]
    fn minimize_is_idempotent() {
        for p in ["/a/./b//c/../d", "a/../../b", "/..", "./", "a/b/.."] {
            let once = minimize(p);
            assert_eq!(minimize(&once), once, "minimize({:?})", p);
        }
    }

    #[test]
    fn minimize_resolves_dots() {
        assert_eq!(minimize("/a/./b//c/../d"), "/a/b/d");
        assert_eq!(minimize("a/../../b"), "../b");
        assert_eq!(minimize("./"), ".");
    }

    #[test]
    fn unquote_strips_matched_quotes_only() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc'"), "\"abc'");
        assert_eq!(unquote("abc"), "abc");
    }

    #[test]
    fn identifier_safe_name() {
        assert_eq!(get_identifier_safe_name("my-app.2"), "my_app_2");
        assert_eq!(get_identifier_safe_name("9lives"), "_9lives");
    }
}
