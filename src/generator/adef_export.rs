//! Exported .adef generation
//!
//! Re-serialises an App model into a binary-redistributable .adef: bundled
//! source paths are rewritten to their post-install locations, default-valued
//! limits are skipped, and the executable/component composition is kept.

use std::fmt::Write as _;

use crate::buildparams::BuildParams;
use crate::model::{App, FileSystemObject, Limit, Model, Permissions, StartTrigger};
use crate::system::{self, path, Error};

fn generate_limit(out: &mut String, name: &str, value: &Limit<u64>) {
    if value.is_set() {
        let _ = writeln!(out, "{}: {}", name, value.get());
    }
}

fn generate_basic_info(out: &mut String, app: &App) {
    out.push('\n');

    if !app.version.is_empty() {
        let _ = writeln!(out, "version: {}", app.version);
    }

    let _ = writeln!(
        out,
        "start: {}",
        if app.start_trigger == StartTrigger::Auto {
            "auto"
        } else {
            "manual"
        }
    );

    let _ = writeln!(out, "sandboxed: {}", if app.is_sandboxed { "true" } else { "false" });
    if let Some(action) = app.watchdog_action {
        let _ = writeln!(out, "watchdogAction: {}", action.as_str());
    }
    if let Some(timeout) = app.watchdog_timeout {
        let _ = writeln!(out, "watchdogTimeout: {}", timeout);
    }
    generate_limit(out, "cpuShare", &app.cpu_share);
    generate_limit(out, "maxFileSystemBytes", &app.max_file_system_bytes);
    generate_limit(out, "maxMemoryBytes", &app.max_memory_bytes);
    generate_limit(out, "maxMQueueBytes", &app.max_mqueue_bytes);
    generate_limit(out, "maxQueuedSignals", &app.max_queued_signals);
    generate_limit(out, "maxThreads", &app.max_threads);
    generate_limit(out, "maxSecureStorageBytes", &app.max_secure_storage_bytes);

    if !app.groups.is_empty() {
        out.push_str("\ngroups:\n{\n");
        for group in &app.groups {
            let _ = writeln!(out, "    {}", group);
        }
        out.push_str("}\n");
    }
}

fn permissions_str(permissions: &Permissions) -> String {
    format!(
        "[{}{}{}]",
        if permissions.readable { "r" } else { "" },
        if permissions.writeable { "w" } else { "" },
        if permissions.executable { "x" } else { "" }
    )
}

fn generate_fs_object_item(out: &mut String, item: &FileSystemObject, write_permissions: bool) {
    out.push_str("        ");
    if write_permissions {
        let _ = write!(out, "{}   ", permissions_str(&item.permissions));
    }
    let _ = writeln!(out, "{}   {}", item.src_path, item.dest_path);
}

fn generate_fs_object_items(
    out: &mut String,
    section_name: &str,
    items: &[&FileSystemObject],
    write_permissions: bool,
) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "\n    {}:\n    {{\n", section_name);
    for item in items {
        generate_fs_object_item(out, item, write_permissions);
    }
    out.push_str("    }\n");
}

/// A bundled object's exported source path is where it lives after install.
fn remap_bundled_src(item: &FileSystemObject) -> FileSystemObject {
    let mut remapped = item.clone();
    remapped.src_path = item.dest_path[1..].to_string();
    if remapped.src_path.is_empty() || remapped.src_path.ends_with('/') {
        remapped.src_path.push_str(&path::get_last_node(&item.src_path));
    }
    remapped
}

fn generate_requires_section(out: &mut String, model: &Model, app: &App) {
    out.push_str("\nrequires:\n{\n");

    if !app.config_trees.is_empty() {
        out.push_str("    configTree:\n    {\n");
        for (tree_name, permissions) in &app.config_trees {
            out.push_str("        ");
            if permissions.writeable {
                out.push_str("[w] ");
            }
            let _ = writeln!(out, "{}", tree_name);
        }
        out.push_str("    }\n");
    }

    let mut files: Vec<&FileSystemObject> = Vec::new();
    let mut dirs: Vec<&FileSystemObject> = Vec::new();
    let mut devices: Vec<&FileSystemObject> = Vec::new();
    for &component_id in &app.components {
        let component = model.component(component_id);
        files.extend(component.required_files.iter());
        dirs.extend(component.required_dirs.iter());
        devices.extend(component.required_devices.iter());
    }
    files.extend(app.required_files.iter());
    dirs.extend(app.required_dirs.iter());
    devices.extend(app.required_devices.iter());

    generate_fs_object_items(out, "file", &files, false);
    generate_fs_object_items(out, "dir", &dirs, false);
    generate_fs_object_items(out, "device", &devices, true);

    out.push_str("}\n");
}

fn generate_bundles_section(out: &mut String, model: &Model, app: &App) {
    let mut files: Vec<FileSystemObject> = Vec::new();
    let mut dirs: Vec<FileSystemObject> = Vec::new();
    for &component_id in &app.components {
        let component = model.component(component_id);
        files.extend(component.bundled_files.iter().map(remap_bundled_src));
        dirs.extend(component.bundled_dirs.iter().map(remap_bundled_src));
    }
    files.extend(app.bundled_files.iter().map(remap_bundled_src));
    dirs.extend(app.bundled_dirs.iter().map(remap_bundled_src));

    out.push_str("\nbundles:\n{\n");
    generate_fs_object_items(out, "file", &files.iter().collect::<Vec<_>>(), true);
    generate_fs_object_items(out, "dir", &dirs.iter().collect::<Vec<_>>(), false);
    out.push_str("}\n");
}

fn generate_processes_sections(out: &mut String, app: &App) {
    for proc_env in &app.process_envs {
        if proc_env.processes.is_empty() {
            continue;
        }

        out.push_str("\nprocesses:\n{\n");

        out.push_str("    run:\n    {\n");
        for process in &proc_env.processes {
            let _ = write!(out, "        {} = ( {}", process.name(), process.exe_path);
            for arg in &process.args {
                let _ = write!(out, " \"{}\"", arg);
            }
            out.push_str(" )\n");
        }
        out.push_str("    }\n");

        if !proc_env.env_vars.is_empty() {
            out.push_str("\n    envVars:\n    {\n");
            for (name, value) in &proc_env.env_vars {
                let _ = writeln!(out, "        {} = \"{}\"", name, value);
            }
            out.push_str("    }\n");
        }

        if let Some(fault_action) = proc_env.fault_action {
            let _ = writeln!(out, "    faultAction: {}", fault_action.as_str());
        }
        if proc_env.start_priority().is_set() {
            let _ = writeln!(out, "    priority: {}", proc_env.start_priority().get());
        }
        generate_limit_indented(out, "maxCoreDumpFileBytes", &proc_env.max_core_dump_file_bytes);
        generate_limit_indented(out, "maxFileBytes", &proc_env.max_file_bytes);
        generate_limit_indented(out, "maxFileDescriptors", &proc_env.max_file_descriptors);
        generate_limit_indented(out, "maxLockedMemoryBytes", &proc_env.max_locked_memory_bytes);
        if let Some(action) = proc_env.watchdog_action {
            let _ = writeln!(out, "    watchdogAction: {}", action.as_str());
        }
        if let Some(timeout) = proc_env.watchdog_timeout {
            let _ = writeln!(out, "    watchdogTimeout: {}", timeout);
        }

        out.push_str("}\n");
    }
}

fn generate_limit_indented(out: &mut String, name: &str, value: &Limit<u64>) {
    if value.is_set() {
        let _ = writeln!(out, "    {}: {}", name, value.get());
    }
}

/// The extern: block is only emitted when the app actually exports
/// interfaces (or carries pre-built ones).
fn generate_extern_section(out: &mut String, model: &Model, app: &App) {
    if app.extern_client_interfaces.is_empty()
        && app.extern_server_interfaces.is_empty()
        && app.pre_built_client_interfaces.is_empty()
        && app.pre_built_server_interfaces.is_empty()
    {
        return;
    }

    out.push_str("\nextern:\n{\n");

    for (name, if_ref) in &app.extern_client_interfaces {
        let instance = app.client_interface(if_ref);
        let component =
            model.component(app.executables[&if_ref.exe].component_instances[if_ref.instance].component);
        let internal = &component.client_apis[instance.api_index].internal_name;
        let _ = writeln!(
            out,
            "    {} = {}.{}.{}",
            name, if_ref.exe, component.name, internal
        );
    }
    for (name, if_ref) in &app.extern_server_interfaces {
        let instance = app.server_interface(if_ref);
        let component =
            model.component(app.executables[&if_ref.exe].component_instances[if_ref.instance].component);
        let internal = &component.server_apis[instance.api_index].internal_name;
        let _ = writeln!(
            out,
            "    {} = {}.{}.{}",
            name, if_ref.exe, component.name, internal
        );
    }

    if !app.pre_built_client_interfaces.is_empty() {
        out.push_str("    requires:\n    {\n");
        for (name, interface) in &app.pre_built_client_interfaces {
            let api = model.api_file(interface.api_file);
            let _ = writeln!(out, "        {} = {}", name, api.path);
        }
        out.push_str("    }\n");
    }
    if !app.pre_built_server_interfaces.is_empty() {
        out.push_str("    provides:\n    {\n");
        for (name, interface) in &app.pre_built_server_interfaces {
            let api = model.api_file(interface.api_file);
            let _ = writeln!(out, "        {} = {}", name, api.path);
        }
        out.push_str("    }\n");
    }

    out.push_str("}\n");
}

fn generate_executables_section(out: &mut String, model: &Model, app: &App) {
    if app.executables.is_empty() {
        return;
    }

    out.push_str("\nexecutables:\n{\n");
    for exe in app.executables.values() {
        let _ = write!(out, "    {} = (", exe.name);
        for instance in &exe.component_instances {
            let _ = write!(out, " {}", model.component(instance.component).dir);
        }
        out.push_str(" )\n");
    }
    out.push_str("}\n");
}

fn generate_bindings_section(out: &mut String, app: &App) {
    let bindings = app.bindings();
    if bindings.is_empty() {
        return;
    }

    out.push_str("\nbindings:\n{\n");
    for binding in bindings {
        // Internal server sides are already spelled exe.component.interface.
        let server = match binding.server_type {
            crate::model::AgentType::Internal => binding.server_if.clone(),
            crate::model::AgentType::ExternalApp => {
                format!("{}.{}", binding.server_agent, binding.server_if)
            }
            crate::model::AgentType::ExternalUser => {
                format!("<{}>.{}", binding.server_agent, binding.server_if)
            }
        };
        let _ = writeln!(out, "    {} -> {}", binding.client_if, server);
    }
    out.push_str("}\n");
}

/// Re-serialise an app model as a binary-redistributable .adef under the
/// working directory.
pub fn generate(model: &Model, app: &App, build_params: &BuildParams) -> Result<(), Error> {
    let file_path = path::combine(&build_params.working_dir, &format!("{}.adef", app.name));

    if build_params.be_verbose {
        system::verboseln!("Generating", "exported .adef for app '{}'.", app.name);
    }

    let mut out = String::new();
    out.push_str("// Binary app definition. Generated by the mk tools; do not edit.\n");

    generate_basic_info(&mut out, app);
    generate_requires_section(&mut out, model, app);
    generate_bundles_section(&mut out, model, app);
    generate_executables_section(&mut out, model, app);
    generate_processes_sections(&mut out, app);
    generate_extern_section(&mut out, model, app);
    generate_bindings_section(&mut out, app);

    system::ensure_directory(&build_params.working_dir)?;
    system::write_file(&file_path, out)
}
