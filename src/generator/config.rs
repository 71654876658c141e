//! Per-app configuration tree generation
//!
//! Emits the `root.cfg` that the installer loads into the system
//! configuration tree when the app is installed on the target.  The format
//! is the Legato config text format: `"name" value` nodes, `!t`/`!f`
//! booleans, `[n]` integers, `(x)` floats and quoted strings.

use std::fmt::Write as _;

use crate::buildparams::BuildParams;
use crate::model::{AgentType, App, Binding, FileSystemObject, Model, StartTrigger};
use crate::system::{self, path, Error};

fn generate_app_version(cfg: &mut String, app: &App) {
    if !app.version.is_empty() {
        let _ = writeln!(cfg, "  \"version\" \"{}\"", app.version);
    }
}

fn generate_app_limits(cfg: &mut String, app: &App) {
    if !app.is_sandboxed {
        cfg.push_str("  \"sandboxed\" !f\n");
    }
    if app.start_trigger == StartTrigger::Manual {
        cfg.push_str("  \"startManual\" !t\n");
    }

    let _ = writeln!(
        cfg,
        "  \"maxSecureStorageBytes\" [{}]",
        app.max_secure_storage_bytes.get()
    );
    let _ = writeln!(cfg, "  \"maxThreads\" [{}]", app.max_threads.get());
    let _ = writeln!(cfg, "  \"maxMQueueBytes\" [{}]", app.max_mqueue_bytes.get());
    let _ = writeln!(
        cfg,
        "  \"maxQueuedSignals\" [{}]",
        app.max_queued_signals.get()
    );
    let _ = writeln!(cfg, "  \"maxMemoryBytes\" [{}]", app.max_memory_bytes.get());
    let _ = writeln!(cfg, "  \"cpuShare\" [{}]", app.cpu_share.get());

    if app.max_file_system_bytes.is_set() {
        // Not supported for unsandboxed apps.
        if !app.is_sandboxed {
            system::warnln!(
                "Warning",
                "File system size limit being ignored for unsandboxed application '{}'.",
                app.name
            );
        } else {
            let _ = writeln!(
                cfg,
                "  \"maxFileSystemBytes\" [{}]",
                app.max_file_system_bytes.get()
            );
        }
    }
}

fn generate_groups(cfg: &mut String, app: &App) {
    if app.groups.is_empty() {
        return;
    }

    // Group names are empty leaf nodes under "groups".
    cfg.push_str("  \"groups\"\n  {\n");
    for group in &app.groups {
        let _ = writeln!(cfg, "    \"{}\" \"\"", group);
    }
    cfg.push_str("  }\n\n");
}

fn generate_single_file_mapping(cfg: &mut String, index: usize, mapping: &FileSystemObject) {
    let _ = writeln!(cfg, "      \"{}\"", index);
    cfg.push_str("      {\n");
    let _ = writeln!(
        cfg,
        "        \"src\" \"{}\"",
        path::escape_quotes(&mapping.src_path)
    );
    let _ = writeln!(
        cfg,
        "        \"dest\" \"{}\"",
        path::escape_quotes(&mapping.dest_path)
    );
    if mapping.permissions.readable {
        cfg.push_str("        \"isReadable\" !t\n");
    }
    if mapping.permissions.writeable {
        cfg.push_str("        \"isWritable\" !t\n");
    }
    if mapping.permissions.executable {
        cfg.push_str("        \"isExecutable\" !t\n");
    }
    cfg.push_str("      }\n");
}

/// The bind-mount entry for a bundled object: the supervisor mounts it from
/// where it is installed in the target file system, so the source becomes
/// the dest path relative to the app's install directory.
fn generate_bundled_object_mapping(cfg: &mut String, index: usize, mapping: &FileSystemObject) {
    let mut bind_mount = mapping.clone();
    bind_mount.src_path = mapping.dest_path[1..].to_string();
    if bind_mount.src_path.is_empty() || bind_mount.src_path.ends_with('/') {
        bind_mount
            .src_path
            .push_str(&path::get_last_node(&mapping.src_path));
    }
    generate_single_file_mapping(cfg, index, &bind_mount);
}

fn generate_file_mappings(cfg: &mut String, model: &Model, app: &App) {
    cfg.push_str("  \"requires\"\n  {\n");

    cfg.push_str("    \"files\"\n    {\n");
    let mut index = 0;
    for &component_id in &app.components {
        for mapping in &model.component(component_id).required_files {
            generate_single_file_mapping(cfg, index, mapping);
            index += 1;
        }
    }
    for mapping in &app.required_files {
        generate_single_file_mapping(cfg, index, mapping);
        index += 1;
    }
    cfg.push_str("    }\n\n");

    cfg.push_str("    \"dirs\"\n    {\n");
    let mut index = 0;
    for &component_id in &app.components {
        for mapping in &model.component(component_id).required_dirs {
            generate_single_file_mapping(cfg, index, mapping);
            index += 1;
        }
    }
    for mapping in &app.required_dirs {
        generate_single_file_mapping(cfg, index, mapping);
        index += 1;
    }
    cfg.push_str("    }\n");

    cfg.push_str("    \"devices\"\n    {\n");
    let mut index = 0;
    for &component_id in &app.components {
        for mapping in &model.component(component_id).required_devices {
            generate_single_file_mapping(cfg, index, mapping);
            index += 1;
        }
    }
    for mapping in &app.required_devices {
        generate_single_file_mapping(cfg, index, mapping);
        index += 1;
    }
    cfg.push_str("    }\n");

    cfg.push_str("  }\n\n");

    cfg.push_str("  \"bundles\"\n  {\n");

    cfg.push_str("    \"files\"\n    {\n");
    let mut index = 0;
    for &component_id in &app.components {
        for mapping in &model.component(component_id).bundled_files {
            generate_bundled_object_mapping(cfg, index, mapping);
            index += 1;
        }
    }
    for mapping in &app.bundled_files {
        generate_bundled_object_mapping(cfg, index, mapping);
        index += 1;
    }
    cfg.push_str("    }\n\n");

    cfg.push_str("    \"dirs\"\n    {\n");
    let mut index = 0;
    for mapping in &app.bundled_dirs {
        generate_bundled_object_mapping(cfg, index, mapping);
        index += 1;
    }
    for &component_id in &app.components {
        for mapping in &model.component(component_id).bundled_dirs {
            generate_bundled_object_mapping(cfg, index, mapping);
            index += 1;
        }
    }
    cfg.push_str("    }\n");

    cfg.push_str("  }\n\n");
}

fn generate_process_env_vars(cfg: &mut String, proc_env: &crate::model::ProcessEnv) {
    cfg.push_str("      \"envVars\"\n      {\n");
    for (name, value) in &proc_env.env_vars {
        let _ = writeln!(
            cfg,
            "        \"{}\" \"{}\"",
            name,
            path::escape_quotes(value)
        );
    }
    cfg.push_str("      }\n");
}

fn generate_processes(cfg: &mut String, app: &App) {
    cfg.push_str("  \"procs\"\n  {\n");

    for proc_env in &app.process_envs {
        for process in &proc_env.processes {
            let _ = writeln!(cfg, "    \"{}\"", process.name());
            cfg.push_str("    {\n");

            // Arg 0 is the executable to run.
            cfg.push_str("      \"args\"\n      {\n");
            let _ = writeln!(
                cfg,
                "        \"0\" \"{}\"",
                path::escape_quotes(&process.exe_path)
            );
            for (arg_index, arg) in process.args.iter().enumerate() {
                let _ = writeln!(
                    cfg,
                    "        \"{}\" \"{}\"",
                    arg_index + 1,
                    path::escape_quotes(arg)
                );
            }
            cfg.push_str("      }\n");

            generate_process_env_vars(cfg, proc_env);

            if let Some(fault_action) = proc_env.fault_action {
                let _ = writeln!(cfg, "      \"faultAction\" \"{}\"", fault_action.as_str());
            }
            if proc_env.start_priority().is_set() {
                let _ = writeln!(
                    cfg,
                    "      \"priority\" \"{}\"",
                    proc_env.start_priority().get()
                );
            }
            let _ = writeln!(
                cfg,
                "      \"maxCoreDumpFileBytes\" [{}]",
                proc_env.max_core_dump_file_bytes.get()
            );
            let _ = writeln!(
                cfg,
                "      \"maxFileBytes\" [{}]",
                proc_env.max_file_bytes.get()
            );
            let _ = writeln!(
                cfg,
                "      \"maxLockedMemoryBytes\" [{}]",
                proc_env.max_locked_memory_bytes.get()
            );
            let _ = writeln!(
                cfg,
                "      \"maxFileDescriptors\" [{}]",
                proc_env.max_file_descriptors.get()
            );

            if let Some(timeout) = proc_env.watchdog_timeout {
                let _ = writeln!(cfg, "      \"watchdogTimeout\" [{}]", timeout.config_value());
            }
            if let Some(action) = proc_env.watchdog_action {
                let _ = writeln!(cfg, "      \"watchdogAction\" \"{}\"", action.as_str());
            }

            cfg.push_str("    }\n");
        }
    }

    cfg.push_str("  }\n\n");
}

fn generate_single_binding(cfg: &mut String, binding: &Binding) {
    let _ = writeln!(cfg, "    \"{}\"", binding.client_if);
    cfg.push_str("    {\n");
    match binding.server_type {
        AgentType::Internal | AgentType::ExternalApp => {
            let _ = writeln!(cfg, "      \"app\" \"{}\"", binding.server_agent);
        }
        AgentType::ExternalUser => {
            let _ = writeln!(cfg, "      \"user\" \"{}\"", binding.server_agent);
        }
    }
    let _ = writeln!(cfg, "      \"interface\" \"{}\"", binding.server_if);
    cfg.push_str("    }\n");
}

fn generate_bindings(cfg: &mut String, app: &App, build_params: &BuildParams) {
    cfg.push_str("  \"bindings\"\n  {\n");

    // On embedded targets the log control daemon runs as root; every app
    // gets its log client interface bound over to it.
    if build_params.is_cross_build() {
        cfg.push_str("    \"LogClient\"\n    {\n");
        cfg.push_str("      \"user\" \"root\"\n");
        cfg.push_str("      \"interface\" \"LogClient\"\n");
        cfg.push_str("    }\n");
    }

    for binding in app.bindings() {
        generate_single_binding(cfg, binding);
    }

    cfg.push_str("  }\n\n");
}

fn generate_config_tree_acl(cfg: &mut String, app: &App) {
    cfg.push_str("  \"configLimits\"\n  {\n");
    cfg.push_str("    \"acl\"\n    {\n");

    for (tree_name, permissions) in &app.config_trees {
        let access = if permissions.writeable { "write" } else { "read" };
        let _ = writeln!(cfg, "      \"{}\" \"{}\"", tree_name, access);
    }

    cfg.push_str("    }\n\n");
    cfg.push_str("  }\n\n");
}

fn generate_app_watchdog(cfg: &mut String, app: &App) {
    if let Some(timeout) = app.watchdog_timeout {
        let _ = writeln!(cfg, "  \"watchdogTimeout\" [{}]", timeout.config_value());
    }
    if let Some(action) = app.watchdog_action {
        let _ = writeln!(cfg, "  \"watchdogAction\" \"{}\"", action.as_str());
    }
}

fn filter_default_value(data_type: &str, default_value: &str) -> String {
    match data_type {
        "bool" => match default_value {
            "true" | "on" => "!t".to_string(),
            _ => "!f".to_string(),
        },
        "int" => format!("[{}]", default_value),
        "float" => format!("({})", default_value),
        _ => format!("\"{}\"", path::unquote(default_value)),
    }
}

fn generate_assets(cfg: &mut String, model: &Model, app: &App) {
    // Object instances 0 and 1 are the standard "Application" and "Process"
    // objects; user assets are numbered from 1000.
    cfg.push_str(concat!(
        "  \"assets\"\n",
        "  {\n",
        "    \"0\"\n",
        "    {\n",
        "      \"name\" \"Application Object\"\n",
        "      \"fields\"\n",
        "      {\n",
        "        \"0\" { \"name\" \"Version\" \"type\" \"string\" \"access\" \"w\" }\n",
        "        \"1\" { \"name\" \"Name\" \"type\" \"string\" \"access\" \"w\" }\n",
        "        \"2\" { \"name\" \"State\" \"type\" \"int\" \"access\" \"w\" }\n",
        "        \"3\" { \"name\" \"StartMode\" \"type\" \"int\" \"access\" \"w\" }\n",
        "      }\n",
        "    }\n",
        "    \"1\"\n",
        "    {\n",
        "      \"name\" \"Process Object\"\n",
        "      \"fields\"\n",
        "      {\n",
        "        \"0\" { \"name\" \"Name\" \"type\" \"string\" \"access\" \"w\" }\n",
        "        \"1\" { \"name\" \"ExecName\" \"type\" \"string\"  \"access\" \"w\" }\n",
        "        \"2\" { \"name\" \"State\" \"type\" \"int\" \"access\" \"w\" }\n",
        "        \"3\" { \"name\" \"FaultAction\" \"type\" \"int\" \"access\" \"w\" }\n",
        "        \"4\" { \"name\" \"FaultCount\" \"type\" \"int\" \"access\" \"w\" }\n",
        "        \"5\" { \"name\" \"FaultLogs\" \"type\" \"string\" \"access\" \"w\" }\n",
        "      }\n",
        "    }\n",
    ));

    let mut asset_id = 1000;
    for &component_id in &app.components {
        for asset in &model.component(component_id).assets {
            let _ = writeln!(cfg, "    \"{}\"", asset_id);
            cfg.push_str("    {\n");
            let _ = writeln!(cfg, "      \"name\" \"{}\"", asset.name);
            cfg.push_str("      \"fields\"\n      {\n");

            for (field_id, field) in asset.fields.iter().enumerate() {
                let _ = write!(
                    cfg,
                    "        \"{}\" {{ \"name\" \"{}\" \"access\" \"{}\"",
                    field_id,
                    field.name,
                    field.kind.access_str()
                );
                if !field.data_type.is_empty() {
                    let _ = write!(cfg, " \"type\" \"{}\"", field.data_type);
                }
                if let Some(default_value) = &field.default_value {
                    let _ = write!(
                        cfg,
                        " \"default\" {}",
                        filter_default_value(&field.data_type, default_value)
                    );
                }
                cfg.push_str(" }\n");
            }

            cfg.push_str("      }\n    }\n");
            asset_id += 1;
        }
    }

    cfg.push_str("  }\n");
}

/// Write the framework configuration for an app into
/// `<workdir>/app/<name>/staging/root.cfg`.
pub fn generate(model: &Model, app: &App, build_params: &BuildParams) -> Result<(), Error> {
    let dir_path = path::combine(
        &path::combine(&build_params.working_dir, &app.working_dir),
        "staging",
    );
    system::ensure_directory(&dir_path)?;
    let file_path = path::combine(&dir_path, "root.cfg");

    if build_params.be_verbose {
        system::verboseln!(
            "Generating",
            "system configuration data for app '{}' in file '{}'.",
            app.name,
            file_path
        );
    }

    let mut cfg = String::new();
    cfg.push_str("{\n");

    generate_app_version(&mut cfg, app);
    generate_app_limits(&mut cfg, app);
    generate_groups(&mut cfg, app);
    generate_file_mappings(&mut cfg, model, app);
    generate_processes(&mut cfg, app);
    generate_bindings(&mut cfg, app, build_params);
    generate_config_tree_acl(&mut cfg, app);
    generate_app_watchdog(&mut cfg, app);
    generate_assets(&mut cfg, model, app);

    cfg.push_str("}\n");

    system::write_file(&file_path, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_filter_to_config_syntax() {
        assert_eq!(filter_default_value("bool", "on"), "!t");
        assert_eq!(filter_default_value("bool", "off"), "!f");
        assert_eq!(filter_default_value("int", "-4"), "[-4]");
        assert_eq!(filter_default_value("float", "1.5"), "(1.5)");
        assert_eq!(filter_default_value("string", "\"hi\""), "\"hi\"");
    }
}
