//! Kernel module modelling

use crate::buildparams::BuildParams;
use crate::envvars;
use crate::model::{Module, ModuleBuild, ObjectFile};
use crate::parse_tree::{DefFile, Item, TokenListItem};
use crate::parser;
use crate::system::{self, path, Error};

fn add_sources(
    build: &mut Option<ModuleBuild>,
    file: &DefFile,
    section: &TokenListItem,
    mdef_dir: &str,
    build_params: &BuildParams,
) -> Result<(), Error> {
    // Either a sources: or a preBuilt: section, never both.
    if matches!(build, Some(ModuleBuild::Prebuilt { .. })) {
        return Err(file.model_error_at(
            section.first,
            "Use either 'sources' or 'preBuilt' section.",
        ));
    }

    let mut c_sources = Vec::new();
    for &token in &section.contents {
        let file_path = super::substituted_text(file, token)?;
        if file_path.is_empty() {
            continue;
        }

        let full_path = system::find_file(&file_path, &[mdef_dir])
            .or_else(|| system::find_file(&file_path, &build_params.source_dirs))
            .ok_or_else(|| {
                file.model_error_at(token, format!("File '{}' does not exist.", file_path))
            })?;

        // Drivers use only C sources.
        if !path::is_c_source(&file_path) {
            return Err(file.model_error_at(
                token,
                format!(
                    "Unrecognized file name extension on source code file '{}'.",
                    file_path
                ),
            ));
        }

        c_sources.push(ObjectFile {
            object_file_path: format!("{}.o", path::remove_suffix(&file_path, ".c")),
            source_file_path: path::to_string(&full_path),
        });
    }

    *build = Some(ModuleBuild::Sources {
        c_sources,
        kernel_dir: String::new(),
    });
    Ok(())
}

fn add_prebuilt(
    build: &mut Option<ModuleBuild>,
    file: &DefFile,
    section: &TokenListItem,
) -> Result<(), Error> {
    if matches!(build, Some(ModuleBuild::Sources { .. })) {
        return Err(file.model_error_at(
            section.first,
            "Use either 'sources' or 'preBuilt' section.",
        ));
    }

    let token = section.contents[0];
    let module_path = super::substituted_text(file, token)?;
    if !path::has_suffix(&module_path, ".ko") {
        return Err(file.model_error_at(
            token,
            format!("File '{}' is not a kernel module (*.ko).", module_path),
        ));
    }
    if !system::file_exists(&module_path) {
        return Err(file.model_error_at(
            token,
            format!("Module file '{}' does not exist.", module_path),
        ));
    }

    match build {
        Some(ModuleBuild::Prebuilt { ko_files }) => {
            if ko_files.contains(&module_path) {
                return Err(file.model_error_at(
                    token,
                    format!("Duplicate preBuilt file {}.", module_path),
                ));
            }
            ko_files.push(module_path);
        }
        _ => {
            *build = Some(ModuleBuild::Prebuilt {
                ko_files: vec![module_path],
            });
        }
    }
    Ok(())
}

/// Get a conceptual model for the kernel module described by a .mdef file.
pub fn get_module(
    mdef_path: &str,
    build_params: &BuildParams,
) -> Result<Module, Error> {
    let file = parser::mdef::parse(mdef_path, build_params.be_verbose)?;

    if build_params.be_verbose {
        system::verboseln!("Modelling", "module defined in: '{}'", mdef_path);
    }

    let mdef_dir = path::get_containing_dir(mdef_path);
    let mut build: Option<ModuleBuild> = None;
    let mut cflags = Vec::new();
    let mut ldflags = Vec::new();
    let mut params = std::collections::BTreeMap::new();

    for section in &file.sections {
        let name_token = section.name_token();
        let section_name = file.token_text(name_token).to_string();

        match (section_name.as_str(), section) {
            ("params", Item::Complex(complex)) => {
                for item in &complex.items {
                    let item = item.as_tokens().ok_or_else(|| {
                        file.model_error_at(complex.first, "Internal error: malformed params.")
                    })?;
                    let param_name = file.token_text(item.first).to_string();
                    let param_value = path::unquote(file.token_text(item.contents[0]));
                    params.insert(param_name, param_value);
                }
            }
            ("preBuilt", Item::Tokens(tokens)) => add_prebuilt(&mut build, &file, tokens)?,
            ("sources", Item::Tokens(tokens)) => {
                add_sources(&mut build, &file, tokens, &mdef_dir, build_params)?;
            }
            ("cflags", Item::Tokens(tokens)) => {
                for &token in &tokens.contents {
                    cflags.push(
                        envvars::do_substitution(file.token_text(token))
                            .map_err(|e| file.model_error_at(token, e.to_string()))?,
                    );
                }
            }
            ("ldflags", Item::Tokens(tokens)) => {
                for &token in &tokens.contents {
                    ldflags.push(
                        envvars::do_substitution(file.token_text(token))
                            .map_err(|e| file.model_error_at(token, e.to_string()))?,
                    );
                }
            }
            _ => {
                return Err(file.model_error_at(
                    name_token,
                    format!("Unrecognized keyword '{}'.", section_name),
                ));
            }
        }
    }

    let mut build = build.ok_or_else(|| {
        Error::Validate(format!(
            "{}: error: Use either 'sources' or 'preBuilt' section.",
            mdef_path
        ))
    })?;

    // Source-built modules compile against kernel sources found through
    // LEGATO_KERNELROOT, falling back to the sysroot's kernel tree.
    if let ModuleBuild::Sources { kernel_dir, .. } = &mut build {
        let mut kernel = path::unquote(&envvars::do_substitution(&envvars::get(
            "LEGATO_KERNELROOT",
        ))?);
        if kernel.is_empty() {
            kernel = path::combine(&envvars::get("LEGATO_SYSROOT"), "usr/src/kernel");
        }
        if !system::file_exists(&path::combine(&kernel, ".config")) {
            return Err(Error::Validate(format!(
                "{}: error: '{}' is not a valid kernel source directory.",
                mdef_path, kernel
            )));
        }
        *kernel_dir = kernel;
    }

    let mut module = Module::new(
        mdef_path,
        build,
        crate::system::Location::new(mdef_path, 1, 0),
    );
    module.cflags = cflags;
    module.ldflags = ldflags;
    module.params = params;

    Ok(module)
}
