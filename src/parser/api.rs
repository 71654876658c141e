//! .api interface-description scanning
//!
//! The content of .api files is opaque to these tools except for their
//! `USETYPES` statements, which pull type definitions in from other .api
//! files and therefore matter for dependency tracking and header
//! generation.

use crate::system::{self, Error};

/// Scan a .api file and invoke the handler for every .api file it pulls
/// types from.  Dependency names are reported with their `.api` suffix.
pub fn get_dependencies(
    api_file_path: &str,
    mut handler: impl FnMut(String) -> Result<(), Error>,
) -> Result<(), Error> {
    let content = system::read_file(api_file_path)?;

    let mut in_block_comment = false;
    for line in content.lines() {
        let mut line = line.trim();

        if in_block_comment {
            match line.find("*/") {
                Some(end) => {
                    line = line[end + 2..].trim();
                    in_block_comment = false;
                }
                None => continue,
            }
        }
        if let Some(start) = line.find("/*") {
            // Single-line block comments only matter ahead of a USETYPES.
            if !line[start..].contains("*/") {
                in_block_comment = true;
            }
            line = line[..start].trim();
        }
        if let Some(comment) = line.find("//") {
            line = line[..comment].trim();
        }

        let Some(rest) = line.strip_prefix("USETYPES") else {
            continue;
        };
        let name = rest.trim().trim_end_matches(';').trim();
        if name.is_empty() {
            continue;
        }

        let mut dependency = name.to_string();
        if !dependency.ends_with(".api") {
            dependency.push_str(".api");
        }
        handler(dependency)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps_of(content: &str) -> Vec<String> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.api");
        std::fs::write(&path, content).unwrap();
        let mut deps = Vec::new();
        get_dependencies(&path.display().to_string(), |d| {
            deps.push(d);
            Ok(())
        })
        .unwrap();
        deps
    }

    #[test]
    fn finds_usetypes_with_and_without_suffix() {
        let deps = deps_of(
            "// header comment\nUSETYPES le_mdmDefs.api;\nUSETYPES le_audio;\n\
             FUNCTION Play();\n",
        );
        assert_eq!(deps, vec!["le_mdmDefs.api", "le_audio.api"]);
    }

    #[test]
    fn ignores_commented_out_usetypes() {
        let deps = deps_of("// USETYPES le_hidden.api;\n/* USETYPES le_also_hidden.api;\n*/\n");
        assert!(deps.is_empty());
    }
}
