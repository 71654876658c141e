//! Environment variable helpers
//!
//! Definition files may reference environment variables as `$NAME` or
//! `${NAME}`.  Substitution is done here, not in the lexer, so that token
//! text keeps the raw spelling from the file.

use std::collections::BTreeSet;

use crate::buildparams::BuildParams;
use crate::system::{self, path, Error};

/// Name of the environment snapshot file kept in the working directory.
/// Byte-for-byte equality with the previous run's snapshot is the cache key
/// for incremental builds.
pub const SNAPSHOT_FILE_NAME: &str = "mktool_environment";

/// Fetch the value of an optional environment variable ("" if unset).
pub fn get(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

/// Fetch the value of a mandatory environment variable.
pub fn get_required(name: &str) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => Err(Error::MissingEnv(name.to_string())),
    }
}

pub fn set(name: &str, value: &str) {
    std::env::set_var(name, value);
}

/// Write LEGATO_TARGET and LEGATO_BUILD so they can be used in definition
/// files and inherited by any child processes.
pub fn set_target_specific(target: &str) -> Result<(), Error> {
    set("LEGATO_TARGET", target);

    let root = get_required("LEGATO_ROOT")?;
    if root.is_empty() {
        return Err(Error::MissingEnv("LEGATO_ROOT".to_string()));
    }
    set("LEGATO_BUILD", &path::combine(&root, &format!("build/{}", target)));
    Ok(())
}

enum State {
    Normal,
    AfterDollar,
    UnbracketedVarName,
    BracketedVarName,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace `$NAME` and `${NAME}` references in a string with the referenced
/// environment variables' contents.  Unset variables expand to "".
pub fn do_substitution(text: &str) -> Result<String, Error> {
    let mut unused = BTreeSet::new();
    do_substitution_tracked(text, &mut unused)
}

/// Same as [do_substitution], but records the name of every variable that
/// was substituted (set or not) so callers can blame the originating token
/// when a variable changes between runs.
pub fn do_substitution_tracked(
    text: &str,
    used: &mut BTreeSet<String>,
) -> Result<String, Error> {
    let mut result = String::with_capacity(text.len());
    let mut var_name = String::new();
    let mut state = State::Normal;

    let expand = |name: &str, out: &mut String, used: &mut BTreeSet<String>| {
        used.insert(name.to_string());
        out.push_str(&get(name));
    };

    for c in text.chars() {
        match state {
            State::Normal => {
                if c == '$' {
                    var_name.clear();
                    state = State::AfterDollar;
                } else {
                    result.push(c);
                }
            }
            State::AfterDollar => {
                if c == '{' {
                    state = State::BracketedVarName;
                } else if is_name_start(c) {
                    var_name.push(c);
                    state = State::UnbracketedVarName;
                } else {
                    return Err(Error::MalformedEnvRef(
                        "Environment variable name missing after '$'.".to_string(),
                    ));
                }
            }
            State::UnbracketedVarName => {
                if is_name_continue(c) {
                    var_name.push(c);
                } else {
                    // The variable name ends at the first non-name character,
                    // which itself belongs to the output.
                    expand(&var_name, &mut result, used);
                    result.push(c);
                    state = State::Normal;
                }
            }
            State::BracketedVarName => {
                if (var_name.is_empty() && is_name_start(c))
                    || (!var_name.is_empty() && is_name_continue(c))
                {
                    var_name.push(c);
                } else if c == '}' {
                    expand(&var_name, &mut result, used);
                    state = State::Normal;
                } else {
                    return Err(Error::MalformedEnvRef(
                        "Invalid character inside bracketed environment variable name.".to_string(),
                    ));
                }
            }
        }
    }

    match state {
        State::Normal => {}
        State::AfterDollar => {
            return Err(Error::MalformedEnvRef(
                "Environment variable name missing after '$'.".to_string(),
            ));
        }
        State::UnbracketedVarName => {
            // End of string terminates the name.
            expand(&var_name, &mut result, used);
        }
        State::BracketedVarName => {
            return Err(Error::MalformedEnvRef(
                "Closing brace missing from environment variable.".to_string(),
            ));
        }
    }

    Ok(result)
}

fn snapshot_file_path(build_params: &BuildParams) -> String {
    path::combine(&build_params.working_dir, SNAPSHOT_FILE_NAME)
}

/// The current environment as the line-sorted list written to the snapshot
/// file.
fn snapshot_lines() -> Vec<String> {
    let mut lines: Vec<String> = std::env::vars()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    lines.sort();
    lines
}

/// Save the environment in the build's working directory for later use by
/// [matches_saved].
pub fn save(build_params: &BuildParams) -> Result<(), Error> {
    system::ensure_directory(&build_params.working_dir)?;
    let mut content = snapshot_lines().join("\n");
    content.push('\n');
    system::write_file(snapshot_file_path(build_params), content)
}

/// Compare the current environment against the snapshot from the previous
/// run.  Any difference (or a missing snapshot) invalidates the build.
pub fn matches_saved(build_params: &BuildParams) -> bool {
    let file_path = snapshot_file_path(build_params);
    let saved = match std::fs::read_to_string(&file_path) {
        Ok(saved) => saved,
        Err(_) => {
            system::verboseln!(
                "Checking",
                "Environment variables from previous run not found."
            );
            return false;
        }
    };

    let current = snapshot_lines();
    let matches = saved.lines().eq(current.iter().map(|s| s.as_str()));
    if !matches {
        system::verboseln!("Checking", "Environment variables are different this time.");
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_dollar_is_identity() {
        let text = "plain/path/with-no-refs.c";
        assert_eq!(do_substitution(text).unwrap(), text);
    }

    #[test]
    fn substitutes_both_forms() {
        std::env::set_var("MKTOOLS_TEST_SUB", "value");
        assert_eq!(
            do_substitution("a/$MKTOOLS_TEST_SUB/b").unwrap(),
            "a/value/b"
        );
        assert_eq!(
            do_substitution("a/${MKTOOLS_TEST_SUB}b").unwrap(),
            "a/valueb"
        );
    }

    #[test]
    fn unset_expands_to_empty_but_is_recorded() {
        let mut used = BTreeSet::new();
        let result =
            do_substitution_tracked("x/$MKTOOLS_TEST_UNSET_VAR/y", &mut used).unwrap();
        assert_eq!(result, "x//y");
        assert!(used.contains("MKTOOLS_TEST_UNSET_VAR"));
    }

    #[test]
    fn name_ends_at_first_non_name_character() {
        std::env::set_var("MKTOOLS_TEST_A", "1");
        assert_eq!(do_substitution("$MKTOOLS_TEST_A-x").unwrap(), "1-x");
    }

    #[test]
    fn unterminated_brace_fails() {
        assert!(matches!(
            do_substitution("${NOPE"),
            Err(Error::MalformedEnvRef(_))
        ));
        assert!(matches!(
            do_substitution("${NO-PE}"),
            Err(Error::MalformedEnvRef(_))
        ));
        assert!(matches!(do_substitution("$"), Err(Error::MalformedEnvRef(_))));
    }
}
