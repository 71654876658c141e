//! Component modelling

use std::collections::BTreeSet;

use crate::buildparams::BuildParams;
use crate::envvars;
use crate::model::{
    ApiClientInterface, ApiClientInterfaceInstance, ApiFileId, ApiServerInterface,
    ApiServerInterfaceInstance, ApiTypesOnlyInterface, Asset, AssetField, AssetFieldKind,
    Component, ComponentId, ComponentInstance, Exe, Model,
};
use crate::parse_tree::{ComplexItem, DefFile, Item, ItemKind, TokenId, TokenKind, TokenListItem};
use crate::parser;
use crate::system::{self, path, Error};

/// Get the interned .api file object for a path, creating (and scanning)
/// it on first reference.  USETYPES dependencies are resolved against the
/// interface search directories and interned recursively.
pub fn get_api_file(
    model: &mut Model,
    api_file_path: &str,
    search_dirs: &[String],
) -> Result<ApiFileId, Error> {
    if let Some(id) = model.get_api_file(api_file_path) {
        return Ok(id);
    }

    let id = model.create_api_file(api_file_path)?;

    let mut dependencies = Vec::new();
    parser::api::get_dependencies(api_file_path, |dependency| {
        dependencies.push(dependency);
        Ok(())
    })?;

    for dependency in dependencies {
        let dependency_path =
            system::find_file(&dependency, search_dirs).ok_or_else(|| {
                Error::Validate(format!("Can't find dependent .api file: '{}'.", dependency))
            })?;
        let included = get_api_file(model, &path::to_string(&dependency_path), search_dirs)?;
        model.api_file_mut(included).is_included = true;
        model.api_file_mut(id).includes.push(included);
    }

    Ok(id)
}

/// Collect the transitive USETYPES closure of an .api file.
fn get_usetypes_apis(model: &Model, set: &mut BTreeSet<ApiFileId>, api_file: ApiFileId) {
    for &included in &model.api_file(api_file).includes {
        if set.insert(included) {
            get_usetypes_apis(model, set, included);
        }
    }
}

/// Find a component source file: the component's own directory first, then
/// the source search directories.
fn find_source_file(
    component: &Component,
    file: &DefFile,
    token: TokenId,
    build_params: &BuildParams,
) -> Result<String, Error> {
    let file_path = super::substituted_text(file, token)?;

    // Environment substitution may legitimately produce an empty string;
    // the caller skips those.
    if file_path.is_empty() {
        return Ok(file_path);
    }

    let full_path = system::find_file(&file_path, &[component.dir.clone()])
        .or_else(|| system::find_file(&file_path, &build_params.source_dirs))
        .ok_or_else(|| {
            file.model_error_at(token, format!("Couldn't find source file '{}'.", file_path))
        })?;

    Ok(path::make_absolute(&path::to_string(&full_path)))
}

fn add_sources(
    component: &mut Component,
    file: &DefFile,
    section: &TokenListItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    for &token in &section.contents {
        let file_path = find_source_file(component, file, token, build_params)?;
        if file_path.is_empty() {
            continue;
        }

        if path::is_c_source(&file_path) {
            component.c_sources.push(file_path);
        } else if path::is_cxx_source(&file_path) {
            component.cxx_sources.push(file_path);
        } else if path::is_java_source(&file_path) {
            component.java_sources.push(file_path);
        } else if path::is_python_source(&file_path) {
            component.python_sources.push(file_path);
        } else {
            return Err(file.model_error_at(
                token,
                format!(
                    "Unrecognized file name extension on source code file '{}'.",
                    file_path
                ),
            ));
        }
    }
    Ok(())
}

fn add_flags(
    flags: &mut Vec<String>,
    file: &DefFile,
    section: &TokenListItem,
) -> Result<(), Error> {
    for &token in &section.contents {
        let text = envvars::do_substitution(file.token_text(token))
            .map_err(|e| file.model_error_at(token, e.to_string()))?;
        flags.push(text);
    }
    Ok(())
}

fn add_bundled_items(
    component: &mut Component,
    file: &DefFile,
    section: &ComplexItem,
) -> Result<(), Error> {
    for subsection in &section.items {
        let subsection = subsection.as_complex().ok_or_else(|| {
            file.model_error_at(section.first, "Internal error: malformed bundles section.")
        })?;
        for item in &subsection.items {
            let item = item.as_tokens().ok_or_else(|| {
                file.model_error_at(subsection.first, "Internal error: malformed bundled item.")
            })?;
            let mut fs_object = super::get_bundled_item(file, item)?;

            // Relative sources are relative to the component directory.
            if !path::is_absolute(&fs_object.src_path) {
                fs_object.src_path = path::combine(&component.dir, &fs_object.src_path);
            }

            match item.kind {
                ItemKind::BundledFile => {
                    if system::file_exists(&fs_object.src_path) {
                        component.bundled_files.push(fs_object);
                    } else if system::anything_exists(&fs_object.src_path) {
                        return Err(file.model_error_at(
                            item.first,
                            format!("Not a regular file: '{}'", fs_object.src_path),
                        ));
                    } else {
                        return Err(file.model_error_at(
                            item.first,
                            format!("File not found: '{}'", fs_object.src_path),
                        ));
                    }
                }
                ItemKind::BundledDir => {
                    if system::directory_exists(&fs_object.src_path) {
                        component.bundled_dirs.push(fs_object);
                    } else if system::anything_exists(&fs_object.src_path) {
                        return Err(file.model_error_at(
                            item.first,
                            format!("Not a directory: '{}'", fs_object.src_path),
                        ));
                    } else {
                        return Err(file.model_error_at(
                            item.first,
                            format!("Directory not found: '{}'", fs_object.src_path),
                        ));
                    }
                }
                _ => {
                    return Err(file.model_error_at(
                        item.first,
                        "Internal error: Unexpected content item in bundles section.",
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Split an api item's contents into (alias, path token, option tokens).
fn split_api_item<'a>(
    file: &'a DefFile,
    item: &'a TokenListItem,
) -> (Option<&'a str>, TokenId, Vec<&'a str>) {
    let mut alias = None;
    let mut index = 0;
    if matches!(
        file.token(item.contents[0]).kind,
        TokenKind::Name | TokenKind::DottedName
    ) {
        alias = Some(file.token_text(item.contents[0]));
        index = 1;
    }
    let path_token = item.contents[index];
    let options = item.contents[index + 1..]
        .iter()
        .map(|&t| file.token_text(t))
        .collect();
    (alias, path_token, options)
}

/// Resolve an api item's file path against the interface search dirs.
fn find_api_file(
    file: &DefFile,
    path_token: TokenId,
    build_params: &BuildParams,
) -> Result<String, Error> {
    let raw = super::substituted_text(file, path_token)?;
    let found = system::find_file(&raw, &build_params.interface_dirs).ok_or_else(|| {
        file.model_error_at(path_token, format!("Couldn't find file '{}'.", raw))
    })?;
    Ok(path::to_string(&found))
}

fn get_provided_api(
    model: &mut Model,
    component: &mut Component,
    file: &DefFile,
    item: &TokenListItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let (alias, path_token, options) = split_api_item(file, item);
    let api_file_path = find_api_file(file, path_token, build_params)?;

    let is_async = options.contains(&"[async]");
    let manual_start = options.contains(&"[manual-start]");

    let api_file = get_api_file(model, &api_file_path, &build_params.interface_dirs)?;
    let internal_name = match alias {
        Some(alias) => alias.to_string(),
        None => model.api_file(api_file).default_prefix.clone(),
    };

    component.server_apis.push(ApiServerInterface {
        api_file,
        internal_name,
        is_async,
        manual_start,
    });

    get_usetypes_apis(model, &mut component.server_usetypes_apis, api_file);
    Ok(())
}

fn get_required_api(
    model: &mut Model,
    component: &mut Component,
    file: &DefFile,
    item: &TokenListItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let (alias, path_token, options) = split_api_item(file, item);
    let api_file_path = find_api_file(file, path_token, build_params)?;

    let types_only = options.contains(&"[types-only]");
    let manual_start = options.contains(&"[manual-start]");
    let optional = options.contains(&"[optional]");
    if types_only && manual_start {
        return Err(file.model_error_at(
            item.first,
            "Can't use both [types-only] and [manual-start] for the same interface.",
        ));
    }

    let api_file = get_api_file(model, &api_file_path, &build_params.interface_dirs)?;
    let internal_name = match alias {
        Some(alias) => alias.to_string(),
        None => model.api_file(api_file).default_prefix.clone(),
    };

    if types_only {
        component.types_only_apis.push(ApiTypesOnlyInterface {
            api_file,
            internal_name,
        });
    } else {
        component.client_apis.push(ApiClientInterface {
            api_file,
            internal_name,
            manual_start,
            optional,
        });
    }

    get_usetypes_apis(model, &mut component.client_usetypes_apis, api_file);
    Ok(())
}

fn add_provided_items(
    model: &mut Model,
    component: &mut Component,
    file: &DefFile,
    section: &ComplexItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    for subsection in &section.items {
        let subsection = subsection.as_complex().ok_or_else(|| {
            file.model_error_at(section.first, "Internal error: malformed provides section.")
        })?;
        for item in &subsection.items {
            let item = item.as_tokens().ok_or_else(|| {
                file.model_error_at(subsection.first, "Internal error: malformed api item.")
            })?;
            get_provided_api(model, component, file, item, build_params)?;
        }
    }
    Ok(())
}

fn add_required_items(
    model: &mut Model,
    component: &mut Component,
    file: &DefFile,
    section: &ComplexItem,
    build_params: &BuildParams,
    in_progress: &mut Vec<String>,
) -> Result<(), Error> {
    for subsection in &section.items {
        match subsection {
            Item::Complex(subsection) => {
                let subsection_name = file.token_text(subsection.name);
                for item in &subsection.items {
                    let item = item.as_tokens().ok_or_else(|| {
                        file.model_error_at(
                            subsection.first,
                            "Internal error: malformed required item.",
                        )
                    })?;
                    match subsection_name {
                        "api" => {
                            get_required_api(model, component, file, item, build_params)?;
                        }
                        "file" => {
                            component
                                .required_files
                                .push(super::get_required_file_or_dir(file, item)?);
                        }
                        "dir" => {
                            component
                                .required_dirs
                                .push(super::get_required_file_or_dir(file, item)?);
                        }
                        "device" => {
                            component
                                .required_devices
                                .push(super::get_required_device(file, item)?);
                        }
                        _ => {
                            return Err(file.model_error_at(
                                subsection.name,
                                format!(
                                    "Internal error: Unexpected required item: {}",
                                    subsection_name
                                ),
                            ));
                        }
                    }
                }
            }
            Item::Tokens(subsection) => {
                // "lib" and "component" subsections are plain token lists.
                let subsection_name = file.token_text(subsection.first);
                match subsection_name {
                    "component" => {
                        for &token in &subsection.contents {
                            let component_path = super::substituted_text(file, token)?;
                            if component_path.is_empty() {
                                continue;
                            }
                            let found = system::find_component(
                                &component_path,
                                &build_params.source_dirs,
                            )
                            .or_else(|| {
                                system::find_component(&component_path, &[&component.dir])
                            })
                            .ok_or_else(|| {
                                file.model_error_at(
                                    token,
                                    format!("Couldn't find component '{}'.", component_path),
                                )
                            })?;
                            // May trigger parsing of the sub-component's own
                            // Component.cdef.
                            let sub = get_component_internal(
                                model,
                                &path::to_string(&found),
                                build_params,
                                in_progress,
                            )?;
                            component.sub_components.push(sub);
                        }
                    }
                    "lib" => {
                        for &token in &subsection.contents {
                            let lib_short_name = super::substituted_text(file, token)?;
                            if !lib_short_name.is_empty() {
                                component.ldflags.push(format!("-l{}", lib_short_name));
                            }
                        }
                    }
                    _ => {
                        return Err(file.model_error_at(
                            subsection.first,
                            format!(
                                "Internal error: Unexpected required item: {}",
                                subsection_name
                            ),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

fn add_asset_fields(
    asset: &mut Asset,
    kind: AssetFieldKind,
    file: &DefFile,
    subsection: &ComplexItem,
) -> Result<(), Error> {
    for item in &subsection.items {
        let item = item.as_tokens().ok_or_else(|| {
            file.model_error_at(subsection.first, "Internal error: malformed asset field.")
        })?;
        match kind {
            AssetFieldKind::Command => {
                asset.fields.push(AssetField {
                    kind,
                    data_type: String::new(),
                    name: file.token_text(item.first).to_string(),
                    default_value: None,
                });
            }
            AssetFieldKind::Setting | AssetFieldKind::Variable => {
                asset.fields.push(AssetField {
                    kind,
                    data_type: file.token_text(item.first).to_string(),
                    name: file.token_text(item.contents[0]).to_string(),
                    default_value: item
                        .contents
                        .get(1)
                        .map(|&t| file.token_text(t).to_string()),
                });
            }
        }
    }
    Ok(())
}

fn add_user_assets(
    component: &mut Component,
    file: &DefFile,
    section: &ComplexItem,
) -> Result<(), Error> {
    for asset_item in &section.items {
        let asset_item = asset_item.as_complex().ok_or_else(|| {
            file.model_error_at(section.first, "Internal error: malformed assets section.")
        })?;
        let mut asset = Asset {
            name: file.token_text(asset_item.name).to_string(),
            fields: Vec::new(),
        };

        for subsection in &asset_item.items {
            let subsection = subsection.as_complex().ok_or_else(|| {
                file.model_error_at(asset_item.first, "Internal error: malformed asset subsection.")
            })?;
            let kind = match file.token_text(subsection.name) {
                "settings" => AssetFieldKind::Setting,
                "variables" => AssetFieldKind::Variable,
                "commands" => AssetFieldKind::Command,
                text => {
                    return Err(file.model_error_at(
                        subsection.name,
                        format!("Unexpected asset subsection, '{}'.", text),
                    ));
                }
            };
            add_asset_fields(&mut asset, kind, file, subsection)?;
        }

        component.assets.push(asset);
    }
    Ok(())
}

/// Get the conceptual model for the component in a given directory,
/// parsing its Component.cdef on first reference.
pub fn get_component(
    model: &mut Model,
    component_dir: &str,
    build_params: &BuildParams,
) -> Result<ComponentId, Error> {
    let mut in_progress = Vec::new();
    get_component_internal(model, component_dir, build_params, &mut in_progress)
}

fn get_component_internal(
    model: &mut Model,
    component_dir: &str,
    build_params: &BuildParams,
    in_progress: &mut Vec<String>,
) -> Result<ComponentId, Error> {
    // Interned: return the previously modelled object.
    if let Some(id) = model.get_component(component_dir) {
        return Ok(id);
    }

    let canonical_dir = path::make_canonical(component_dir);
    if in_progress.contains(&canonical_dir) {
        return Err(Error::Validate(format!(
            "Dependency loop detected between components: {} -> {}",
            in_progress.join(" -> "),
            canonical_dir
        )));
    }
    in_progress.push(canonical_dir.clone());

    let cdef_file_path = path::combine(&canonical_dir, "Component.cdef");
    let file = parser::cdef::parse(&cdef_file_path, build_params.be_verbose)?;

    let mut component = Component::new(
        &cdef_file_path,
        crate::system::Location::new(cdef_file_path.as_str(), 1, 0),
    );
    if build_params.be_verbose {
        system::verboseln!(
            "Modelling",
            "component: '{}' found at: '{}'",
            component.name,
            component.dir
        );
    }

    for section in &file.sections {
        let section_name = file.token_text(section.name_token()).to_string();
        match (section_name.as_str(), section) {
            ("sources", Item::Tokens(tokens)) => {
                add_sources(&mut component, &file, tokens, build_params)?;
            }
            ("cflags", Item::Tokens(tokens)) => {
                add_flags(&mut component.cflags, &file, tokens)?;
            }
            ("cxxflags", Item::Tokens(tokens)) => {
                add_flags(&mut component.cxxflags, &file, tokens)?;
            }
            ("ldflags", Item::Tokens(tokens)) => {
                add_flags(&mut component.ldflags, &file, tokens)?;
            }
            ("bundles", Item::Complex(complex)) => {
                add_bundled_items(&mut component, &file, complex)?;
            }
            ("provides", Item::Complex(complex)) => {
                add_provided_items(model, &mut component, &file, complex, build_params)?;
            }
            ("requires", Item::Complex(complex)) => {
                add_required_items(
                    model,
                    &mut component,
                    &file,
                    complex,
                    build_params,
                    in_progress,
                )?;
            }
            ("assets", Item::Complex(complex)) => {
                add_user_assets(&mut component, &file, complex)?;
            }
            _ => {
                return Err(file.model_error_at(
                    section.name_token(),
                    format!("Internal error: Unrecognized section '{}'.", section_name),
                ));
            }
        }
    }

    // Compiled components get a library and an init function to run.
    if component.has_c_or_cpp_code() {
        component.lib = path::combine(
            &build_params.lib_output_dir,
            &format!("libComponent_{}.so", component.name),
        );
        component.init_func_name = format!("_{}_COMPONENT_INIT", component.name);
    }

    in_progress.pop();
    model.add_component(component)
}

/// Add an instance of a component (and, first, of all its sub-components)
/// to an executable.
///
/// Within one executable a component is instantiated at most once; the
/// recursion into sub-components keeps `component_instances` topologically
/// sorted with leaves first, which is the order the component init
/// functions must run in.
pub fn add_component_instance(model: &Model, exe: &mut Exe, component_id: ComponentId) {
    if exe
        .component_instances
        .iter()
        .any(|instance| instance.component == component_id)
    {
        return;
    }

    for &sub in &model.component(component_id).sub_components {
        add_component_instance(model, exe, sub);
    }

    let component = model.component(component_id);
    let mut instance = ComponentInstance {
        component: component_id,
        client_apis: Vec::new(),
        server_apis: Vec::new(),
    };

    for (api_index, interface) in component.client_apis.iter().enumerate() {
        instance.client_apis.push(ApiClientInterfaceInstance {
            api_index,
            name: format!("{}.{}.{}", exe.name, component.name, interface.internal_name),
            is_external: false,
            extern_mark: None,
            binding: None,
        });
    }
    for (api_index, interface) in component.server_apis.iter().enumerate() {
        instance.server_apis.push(ApiServerInterfaceInstance {
            api_index,
            name: format!("{}.{}.{}", exe.name, component.name, interface.internal_name),
            is_external: false,
            extern_mark: None,
        });
    }

    exe.has_c_or_cpp_code |= component.has_c_or_cpp_code();
    exe.has_java_code |= component.has_java_code();
    exe.has_python_code |= component.has_python_code();

    exe.component_instances.push(instance);
}
