//! Lowering parse trees into the conceptual model

mod app;
mod component;
mod module;
mod system;

pub use app::get_app;
pub use component::{add_component_instance, get_api_file, get_component};
pub use module::get_module;
pub use system::get_system;

use crate::buildparams::BuildParams;
use crate::envvars;
use crate::model::{
    AgentType, App, Binding, FileSystemObject, Model, Permissions, WatchdogTimeout,
};
use crate::parse_tree::{DefFile, TokenKind, TokenListItem};
use crate::system::{self as sys, path, Error};

/// Decode a FILE_PERMISSIONS token ("[rwx]" etc.).
pub(crate) fn get_permissions(text: &str) -> Permissions {
    let mut permissions = Permissions::default();
    for c in text.chars() {
        match c {
            'r' => permissions.readable = true,
            'w' => permissions.writeable = true,
            'x' => permissions.executable = true,
            _ => {}
        }
    }
    permissions
}

pub(crate) fn remove_angle_brackets(name: &str) -> &str {
    name.trim_start_matches('<').trim_end_matches('>')
}

/// Substitute environment references in a token's text and strip quotes.
pub(crate) fn substituted_text(file: &DefFile, token: crate::parse_tree::TokenId) -> Result<String, Error> {
    match envvars::do_substitution(file.token_text(token)) {
        Ok(text) => Ok(path::unquote(&text)),
        Err(e) => Err(file.error_at(token, e.to_string())),
    }
}

/// Build a [FileSystemObject] for a bundled file or directory item.
///
/// Bundled items default to read-only; a destination ending in '/' gets the
/// source's last path node appended.
pub(crate) fn get_bundled_item(
    file: &DefFile,
    item: &TokenListItem,
) -> Result<FileSystemObject, Error> {
    let mut contents = item.contents.iter();
    let first = *contents.next().ok_or_else(|| {
        file.model_error_at(item.first, "Internal error: empty bundled item.")
    })?;

    let (permissions, src_token) = if file.token(first).kind == TokenKind::FilePermissions {
        let src = *contents.next().ok_or_else(|| {
            file.model_error_at(item.first, "Internal error: bundled item missing source path.")
        })?;
        (get_permissions(file.token_text(first)), src)
    } else {
        (Permissions::read_only(), first)
    };
    let dest_token = *contents.next().ok_or_else(|| {
        file.model_error_at(item.first, "Internal error: bundled item missing destination path.")
    })?;

    let src_path = substituted_text(file, src_token)?;
    let mut dest_path = substituted_text(file, dest_token)?;
    if dest_path.ends_with('/') {
        dest_path.push_str(&path::get_last_node(&src_path));
    }

    Ok(FileSystemObject {
        src_path,
        dest_path,
        permissions,
    })
}

/// Build a [FileSystemObject] for a required file or directory item.
///
/// Items bind-mounted in from outside keep the permissions they have in the
/// target file system.
pub(crate) fn get_required_file_or_dir(
    file: &DefFile,
    item: &TokenListItem,
) -> Result<FileSystemObject, Error> {
    let src_token = item.contents[0];
    let dest_token = item.contents[1];

    let src_path = substituted_text(file, src_token)?;
    let mut dest_path = substituted_text(file, dest_token)?;

    if src_path.ends_with('/') {
        return Err(file.model_error_at(
            src_token,
            "Required item's path must not end in a '/'.",
        ));
    }
    if dest_path.ends_with('/') {
        dest_path.push_str(&path::get_last_node(&src_path));
    }

    Ok(FileSystemObject {
        src_path,
        dest_path,
        permissions: Permissions::default(),
    })
}

/// Build a [FileSystemObject] for a required device item.
pub(crate) fn get_required_device(
    file: &DefFile,
    item: &TokenListItem,
) -> Result<FileSystemObject, Error> {
    let mut contents = item.contents.iter();
    let first = *contents.next().ok_or_else(|| {
        file.model_error_at(item.first, "Internal error: empty device item.")
    })?;

    let (permissions, src_token) = if file.token(first).kind == TokenKind::FilePermissions {
        let src = *contents.next().ok_or_else(|| {
            file.model_error_at(item.first, "Internal error: device item missing source path.")
        })?;
        (get_permissions(file.token_text(first)), src)
    } else {
        (Permissions::read_only(), first)
    };
    let dest_token = *contents.next().ok_or_else(|| {
        file.model_error_at(item.first, "Internal error: device item missing destination path.")
    })?;

    let src_path = substituted_text(file, src_token)?;
    let mut dest_path = substituted_text(file, dest_token)?;
    if dest_path.ends_with('/') {
        dest_path.push_str(&path::get_last_node(&src_path));
    }

    Ok(FileSystemObject {
        src_path,
        dest_path,
        permissions,
    })
}

/// Extract the value of a simple integer section.
pub(crate) fn get_non_negative_int(file: &DefFile, item: &TokenListItem) -> Result<u64, Error> {
    let token = item.contents[0];
    crate::model::limit::parse_integer(file.token_text(token))
        .map_err(|e| file.model_error_at(token, e.to_string()))
}

/// Extract the value of a simple integer section, rejecting zero.
pub(crate) fn get_positive_int(file: &DefFile, item: &TokenListItem) -> Result<u64, Error> {
    let value = get_non_negative_int(file, item)?;
    if value == 0 {
        return Err(file.model_error_at(
            item.contents[0],
            "Value must be an integer greater than zero, with an optional 'K' suffix.",
        ));
    }
    Ok(value)
}

/// Extract a watchdogTimeout value (an integer or "never").
pub(crate) fn get_watchdog_timeout(
    file: &DefFile,
    item: &TokenListItem,
) -> Result<WatchdogTimeout, Error> {
    let token = item.contents[0];
    if file.token(token).kind == TokenKind::Name {
        // The parser only lets "never" through.
        return Ok(WatchdogTimeout::Never);
    }
    Ok(WatchdogTimeout::Millis(get_non_negative_int(file, item)?))
}

/// Verify that every client-side interface of the app is satisfied: bound,
/// exported for system-level binding, or marked optional.  Unbound le_cfg
/// and le_wdog interfaces are auto-bound to the framework services offered
/// by the root user.
pub fn ensure_client_interfaces_satisfied(model: &Model, app: &mut App) -> Result<(), Error> {
    let exe_names: Vec<String> = app.executables.keys().cloned().collect();

    for exe_name in exe_names {
        let exe = app
            .executables
            .get_mut(&exe_name)
            .expect("exe name collected from the map");
        for instance in &mut exe.component_instances {
            let component = model.component(instance.component);
            for if_instance in &mut instance.client_apis {
                let api = &component.client_apis[if_instance.api_index];
                if if_instance.binding.is_some() || if_instance.is_external || api.optional {
                    continue;
                }

                if api.internal_name == "le_cfg" || api.internal_name == "le_wdog" {
                    // Framework auto-binding to the root user's service.
                    if_instance.binding = Some(Binding {
                        client_type: AgentType::Internal,
                        client_agent: app.name.clone(),
                        client_if: if_instance.name.clone(),
                        server_type: AgentType::ExternalUser,
                        server_agent: "root".to_string(),
                        server_if: api.internal_name.clone(),
                        location: exe.location.clone(),
                    });
                } else {
                    return Err(Error::Model(
                        exe.location.clone(),
                        format!(
                            "Client interface '{}' of component '{}' in executable '{}' is \
                             unsatisfied. It must either be declared an external (inter-app) \
                             required interface (in an \"extern:\" section in the .adef) or be \
                             bound to a server side interface (in the \"bindings:\" section \
                             of the .adef).",
                            api.internal_name, component.name, exe.name
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Cross-compare an app's limits and warn about combinations where one
/// limit will silently cap another at runtime.
pub fn check_for_limits_conflicts(app: &App) {
    let max_memory_bytes = app.max_memory_bytes.get();
    let max_file_system_bytes = app.max_file_system_bytes.get();

    for proc_env in &app.process_envs {
        let max_locked_memory_bytes = proc_env.max_locked_memory_bytes.get();
        if max_locked_memory_bytes > max_memory_bytes {
            sys::warnln!(
                "Warning",
                "application '{}': maxLockedMemoryBytes ({}) will be limited by the \
                 maxMemoryBytes limit ({}).",
                app.name,
                max_locked_memory_bytes,
                max_memory_bytes
            );
        }

        let max_file_bytes = proc_env.max_file_bytes.get();
        let max_core_dump_file_bytes = proc_env.max_core_dump_file_bytes.get();

        if max_core_dump_file_bytes > max_file_bytes {
            sys::warnln!(
                "Warning",
                "application '{}': maxCoreDumpFileBytes ({}) will be limited by the \
                 maxFileBytes limit ({}).",
                app.name,
                max_core_dump_file_bytes,
                max_file_bytes
            );
        }

        if max_core_dump_file_bytes > max_file_system_bytes {
            sys::warnln!(
                "Warning",
                "application '{}': maxCoreDumpFileBytes ({}) will be limited by the \
                 maxFileSystemBytes limit ({}) if the core file is inside the sandbox \
                 temporary file system.",
                app.name,
                max_core_dump_file_bytes,
                max_file_system_bytes
            );
        }

        if max_file_bytes > max_file_system_bytes {
            sys::warnln!(
                "Warning",
                "application '{}': maxFileBytes ({}) will be limited by the \
                 maxFileSystemBytes limit ({}) if the file is inside the sandbox \
                 temporary file system.",
                app.name,
                max_file_bytes,
                max_file_system_bytes
            );
        }
    }
}

/// Build the free-standing executable model for mkexe: one Exe assembled
/// from component directory references.
pub fn model_exe(
    model: &mut Model,
    exe_path: &str,
    component_refs: &[String],
    build_params: &BuildParams,
) -> Result<crate::model::Exe, Error> {
    let mut exe = crate::model::Exe::new(
        exe_path,
        crate::system::Location::new(exe_path, 0, 0),
    );

    for component_ref in component_refs {
        let component_path = envvars::do_substitution(component_ref)?;
        if component_path.is_empty() {
            continue;
        }
        let found = sys::find_component(&component_path, &build_params.source_dirs)
            .or_else(|| sys::find_component(&component_path, &["."]))
            .ok_or_else(|| {
                Error::Validate(format!("Couldn't find component '{}'.", component_path))
            })?;
        let component = get_component(model, &path::to_string(&found), build_params)?;
        add_component_instance(model, &mut exe, component);
    }

    if !exe.has_c_or_cpp_code && !exe.has_java_code && !exe.has_python_code {
        return Err(Error::Validate(format!(
            "Executable '{}' doesn't contain any components that have source code files.",
            exe.name
        )));
    }

    Ok(exe)
}
