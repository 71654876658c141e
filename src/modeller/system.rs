//! System modelling

use crate::buildparams::BuildParams;
use crate::model::{
    AgentType, App, Binding, Command, Model, Priority, StartTrigger, System, User,
};
use crate::parse_tree::{ComplexItem, DefFile, Item, TokenId, TokenKind, TokenListItem};
use crate::parser;
use crate::system::{self, path, Error};

use super::app::get_app;
use super::module::get_module;

/// Apply the overrides listed for one app in the .sdef.
fn model_app_overrides(
    app: &mut App,
    file: &DefFile,
    app_section: &ComplexItem,
) -> Result<(), Error> {
    let mut groups_overridden = false;

    for subsection in &app_section.items {
        let name_token = subsection.name_token();
        let subsection_name = file.token_text(name_token).to_string();

        match (subsection_name.as_str(), subsection) {
            ("cpuShare", Item::Tokens(tokens)) => {
                app.cpu_share.set(super::get_positive_int(file, tokens)?);
            }
            ("faultAction", Item::Tokens(tokens)) => {
                let action = crate::model::FaultAction::parse(file.token_text(tokens.contents[0]))
                    .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?;
                for proc_env in &mut app.process_envs {
                    proc_env.fault_action = Some(action);
                }
            }
            ("groups", Item::Tokens(tokens)) => {
                // The first groups override replaces the .adef's list.
                if !groups_overridden {
                    app.groups.clear();
                    groups_overridden = true;
                }
                for &token in &tokens.contents {
                    app.groups.insert(file.token_text(token).to_string());
                }
            }
            ("maxCoreDumpFileBytes", Item::Tokens(tokens)) => {
                let value = super::get_non_negative_int(file, tokens)?;
                for proc_env in &mut app.process_envs {
                    proc_env.max_core_dump_file_bytes.set(value);
                }
            }
            ("maxFileBytes", Item::Tokens(tokens)) => {
                let value = super::get_non_negative_int(file, tokens)?;
                for proc_env in &mut app.process_envs {
                    proc_env.max_file_bytes.set(value);
                }
            }
            ("maxFileDescriptors", Item::Tokens(tokens)) => {
                let value = super::get_positive_int(file, tokens)?;
                for proc_env in &mut app.process_envs {
                    proc_env.max_file_descriptors.set(value);
                }
            }
            ("maxFileSystemBytes", Item::Tokens(tokens)) => {
                app.max_file_system_bytes
                    .set(super::get_non_negative_int(file, tokens)?);
            }
            ("maxLockedMemoryBytes", Item::Tokens(tokens)) => {
                let value = super::get_non_negative_int(file, tokens)?;
                for proc_env in &mut app.process_envs {
                    proc_env.max_locked_memory_bytes.set(value);
                }
            }
            ("maxMemoryBytes", Item::Tokens(tokens)) => {
                app.max_memory_bytes
                    .set(super::get_positive_int(file, tokens)?);
            }
            ("maxMQueueBytes", Item::Tokens(tokens)) => {
                app.max_mqueue_bytes
                    .set(super::get_non_negative_int(file, tokens)?);
            }
            ("maxPriority", Item::Tokens(tokens)) => {
                let priority = Priority::parse(file.token_text(tokens.contents[0]))
                    .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?;
                for proc_env in &mut app.process_envs {
                    proc_env.set_max_priority(priority.clone());
                }
            }
            ("maxQueuedSignals", Item::Tokens(tokens)) => {
                app.max_queued_signals
                    .set(super::get_non_negative_int(file, tokens)?);
            }
            ("maxThreads", Item::Tokens(tokens)) => {
                app.max_threads.set(super::get_positive_int(file, tokens)?);
            }
            ("maxSecureStorageBytes", Item::Tokens(tokens)) => {
                app.max_secure_storage_bytes
                    .set(super::get_non_negative_int(file, tokens)?);
            }
            ("pools", Item::Complex(pools)) => {
                for item in &pools.items {
                    let item = item.as_tokens().ok_or_else(|| {
                        file.model_error_at(pools.first, "Internal error: malformed pools.")
                    })?;
                    let pool_name = file.token_text(item.first).to_string();
                    let size = super::get_non_negative_int(file, item)?;
                    app.pools.insert(pool_name, size);
                }
            }
            ("sandboxed", Item::Tokens(tokens)) => {
                app.is_sandboxed = file.token_text(tokens.contents[0]) != "false";
            }
            ("start", Item::Tokens(tokens)) => {
                match file.token_text(tokens.contents[0]) {
                    "auto" => app.start_trigger = StartTrigger::Auto,
                    "manual" => app.start_trigger = StartTrigger::Manual,
                    text => {
                        return Err(file.model_error_at(
                            tokens.contents[0],
                            format!(
                                "Unrecognized start mode '{}'. Expected 'auto' or 'manual'.",
                                text
                            ),
                        ));
                    }
                }
            }
            ("preloaded", Item::Tokens(tokens)) => {
                app.is_preloaded = file.token_text(tokens.contents[0]) != "false";
            }
            ("watchdogAction", Item::Tokens(tokens)) => {
                app.watchdog_action = Some(
                    crate::model::WatchdogAction::parse(file.token_text(tokens.contents[0]))
                        .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?,
                );
            }
            ("watchdogTimeout", Item::Tokens(tokens)) => {
                app.watchdog_timeout = Some(super::get_watchdog_timeout(file, tokens)?);
            }
            _ => {
                return Err(file.model_error_at(
                    name_token,
                    format!("Internal error: Unexpected subsection '{}'.", subsection_name),
                ));
            }
        }
    }

    Ok(())
}

/// Aggregate pool-size overrides whose names are prefixed with an API alias
/// onto the interned .api file objects.
fn aggregate_pool_sizes(model: &mut Model, app: &App) {
    for (pool_name, &size) in &app.pools {
        let Some((alias, pool)) = pool_name.split_once('.') else {
            continue;
        };
        for &component_id in &app.components {
            let component = model.component(component_id);
            let api_file = component
                .client_apis
                .iter()
                .find(|api| api.internal_name == alias)
                .map(|api| api.api_file)
                .or_else(|| {
                    component
                        .server_apis
                        .iter()
                        .find(|api| api.internal_name == alias)
                        .map(|api| api.api_file)
                });
            if let Some(api_file) = api_file {
                model
                    .api_file_mut(api_file)
                    .pool_sizes
                    .insert(pool.to_string(), size);
                break;
            }
        }
    }
}

fn model_app(
    model: &mut Model,
    sys: &mut System,
    file: &DefFile,
    section: &ComplexItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let app_spec = super::substituted_text(file, section.name)?;

    // The entry is either a bare app name or a .adef path.
    let (app_name, adef_path) = if path::has_suffix(&app_spec, ".adef") {
        (
            path::remove_suffix(&path::get_last_node(&app_spec), ".adef"),
            system::find_file(&app_spec, &build_params.source_dirs),
        )
    } else {
        (
            path::get_last_node(&app_spec),
            system::find_file(&format!("{}.adef", app_spec), &build_params.source_dirs),
        )
    };

    let adef_path = adef_path.ok_or_else(|| {
        file.model_error_at(
            section.name,
            format!(
                "Can't find definition file (.adef) for app specification '{}'. Looked in \
                 the following places: {}",
                app_spec,
                build_params.source_dirs.join(", ")
            ),
        )
    })?;

    if let Some(previous) = sys.apps.get(&app_name) {
        return Err(file.model_error_at(
            section.name,
            format!(
                "App '{}' added to the system more than once.  Previously added at line {}.",
                app_name, previous.location.line
            ),
        ));
    }

    if build_params.be_verbose {
        system::verboseln!("Modelling", "System contains app '{}'.", app_name);
    }

    let mut app = get_app(model, &path::to_string(&adef_path), build_params)?;
    app.location = file.location(section.name);

    model_app_overrides(&mut app, file, section)?;
    aggregate_pool_sizes(model, &app);

    sys.apps.insert(app_name, app);
    Ok(())
}

/// Resolve the server half of a system-level binding and verify that an
/// EXTERNAL_APP server interface actually exists.
fn get_binding_server_side(
    sys: &System,
    file: &DefFile,
    agent_token: TokenId,
    interface_token: TokenId,
) -> Result<(AgentType, String, String), Error> {
    let agent_name = file.token_text(agent_token);
    let interface_name = file.token_text(interface_token).to_string();

    if agent_name.starts_with('<') {
        return Ok((
            AgentType::ExternalUser,
            super::remove_angle_brackets(agent_name).to_string(),
            interface_name,
        ));
    }

    // Server is an app: the named interface must be exported (or pre-built)
    // on that app.
    let app = sys.apps.get(agent_name).ok_or_else(|| {
        file.model_error_at(agent_token, format!("App '{}' is not in the system.", agent_name))
    })?;
    if !app.extern_server_interfaces.contains_key(&interface_name)
        && !app.pre_built_server_interfaces.contains_key(&interface_name)
    {
        return Err(file.model_error_at(
            interface_token,
            format!(
                "App '{}' has no external server-side interface named '{}'.",
                agent_name, interface_name
            ),
        ));
    }

    Ok((AgentType::ExternalApp, agent_name.to_string(), interface_name))
}

fn add_non_app_user_binding(
    sys: &mut System,
    file: &DefFile,
    item: &TokenListItem,
    binding: Binding,
) -> Result<(), Error> {
    let user_name = binding.client_agent.clone();
    let interface_name = binding.client_if.clone();

    let user = sys
        .users
        .entry(user_name.clone())
        .or_insert_with(|| User::new(&user_name));

    if let Some(previous) = user.bindings.get(&interface_name) {
        return Err(file.model_error_at(
            item.first,
            format!(
                "Duplicate binding of client-side interface '{}' belonging to non-app user \
                 '{}'. Previous binding was at line {}.",
                interface_name, user_name, previous.location.line
            ),
        ));
    }

    user.bindings.insert(interface_name, binding);
    Ok(())
}

fn model_bindings_section(
    model: &Model,
    sys: &mut System,
    file: &DefFile,
    items: &[&TokenListItem],
    be_verbose: bool,
) -> Result<(), Error> {
    for item in items {
        let tokens = &item.contents;
        let location = file.location(item.first);

        // Client is either a non-app user or an app.
        if file.token_text(tokens[0]).starts_with('<') {
            // <user>.interface -> server.interface
            let user_name = super::remove_angle_brackets(file.token_text(tokens[0])).to_string();
            let (server_type, server_agent, server_if) =
                get_binding_server_side(sys, file, tokens[2], tokens[3])?;
            let binding = Binding {
                client_type: AgentType::ExternalUser,
                client_agent: user_name,
                client_if: file.token_text(tokens[1]).to_string(),
                server_type,
                server_agent,
                server_if,
                location,
            };
            add_non_app_user_binding(sys, file, item, binding)?;
            continue;
        }

        let app_name = file.token_text(tokens[0]).to_string();
        if !sys.apps.contains_key(&app_name) {
            return Err(file.model_error_at(
                tokens[0],
                format!("App '{}' is not in the system.", app_name),
            ));
        }

        if file.token(tokens[1]).kind == TokenKind::Star {
            // app.*.interface: override an internal wildcard binding.
            let client_if = file.token_text(tokens[2]).to_string();
            let (server_type, server_agent, server_if) =
                get_binding_server_side(sys, file, tokens[3], tokens[4])?;
            let binding = Binding {
                client_type: AgentType::Internal,
                client_agent: app_name.clone(),
                client_if: client_if.clone(),
                server_type,
                server_agent,
                server_if,
                location,
            };
            let app = sys.apps.get_mut(&app_name).expect("app checked above");
            if be_verbose && app.wildcard_bindings.contains_key(&client_if) {
                system::verboseln!(
                    "Binding",
                    "Replacing previous wildcard binding '{}.*.{}'.",
                    app_name,
                    client_if
                );
            }
            app.wildcard_bindings.insert(client_if, binding);
        } else if tokens.len() == 4 {
            // app.externalInterface: set or override an external binding.
            let interface_name = file.token_text(tokens[1]).to_string();
            let (server_type, server_agent, server_if) =
                get_binding_server_side(sys, file, tokens[2], tokens[3])?;

            let app = sys.apps.get_mut(&app_name).expect("app checked above");
            let client_ref = app
                .extern_client_interfaces
                .get(&interface_name)
                .cloned()
                .ok_or_else(|| {
                    file.model_error_at(
                        tokens[1],
                        format!(
                            "App '{}' has no external client-side interface named '{}'",
                            app_name, interface_name
                        ),
                    )
                })?;
            let client_if_name = app.client_interface(&client_ref).name.clone();
            let binding = Binding {
                client_type: AgentType::ExternalApp,
                client_agent: app_name.clone(),
                client_if: client_if_name,
                server_type,
                server_agent,
                server_if,
                location,
            };
            let instance = app.client_interface_mut(&client_ref);
            if be_verbose && instance.binding.is_some() {
                system::verboseln!(
                    "Binding",
                    "Overriding binding of '{}.{}'.",
                    binding.client_agent,
                    binding.client_if
                );
            }
            // System-level bindings override app-level ones.
            instance.binding = Some(binding);
        } else {
            // app.exe.comp.interface: override an internal binding.
            let (server_type, server_agent, server_if) =
                get_binding_server_side(sys, file, tokens[4], tokens[5])?;

            let app = sys.apps.get_mut(&app_name).expect("app checked above");
            let client_ref = find_app_client_interface(
                model,
                app,
                file,
                tokens[1],
                tokens[2],
                tokens[3],
            )?;
            let client_if_name = app.client_interface(&client_ref).name.clone();
            let binding = Binding {
                client_type: AgentType::Internal,
                client_agent: app_name.clone(),
                client_if: client_if_name,
                server_type,
                server_agent,
                server_if,
                location,
            };
            let instance = app.client_interface_mut(&client_ref);
            if be_verbose && instance.binding.is_some() {
                system::verboseln!(
                    "Binding",
                    "Overriding binding of '{}.{}'.",
                    binding.client_agent,
                    binding.client_if
                );
            }
            instance.binding = Some(binding);
        }
    }
    Ok(())
}

/// Find a client interface instance by exe/component/interface names within
/// one app.
fn find_app_client_interface(
    model: &Model,
    app: &App,
    file: &DefFile,
    exe_token: TokenId,
    component_token: TokenId,
    interface_token: TokenId,
) -> Result<crate::model::ClientIfRef, Error> {
    let exe_name = file.token_text(exe_token);
    let component_name = file.token_text(component_token);
    let interface_name = file.token_text(interface_token);

    let exe = app.executables.get(exe_name).ok_or_else(|| {
        file.model_error_at(
            exe_token,
            format!("Executable '{}' not defined in application.", exe_name),
        )
    })?;

    for (instance_index, instance) in exe.component_instances.iter().enumerate() {
        let component = model.component(instance.component);
        if component.name != component_name {
            continue;
        }
        for (index, if_instance) in instance.client_apis.iter().enumerate() {
            if component.client_apis[if_instance.api_index].internal_name == interface_name {
                return Ok(crate::model::ClientIfRef {
                    exe: exe_name.to_string(),
                    instance: instance_index,
                    interface: index,
                });
            }
        }
        return Err(file.model_error_at(
            interface_token,
            format!(
                "Client interface '{}' not found in component '{}' in executable '{}'.",
                interface_name, component_name, exe_name
            ),
        ));
    }

    Err(file.model_error_at(
        component_token,
        format!(
            "Component '{}' not found in executable '{}'.",
            component_name, exe_name
        ),
    ))
}

fn model_commands_section(
    sys: &mut System,
    file: &DefFile,
    items: &[&TokenListItem],
) -> Result<(), Error> {
    for item in items {
        let tokens = &item.contents;

        let name = super::substituted_text(file, tokens[0])?;
        if let Some(previous) = sys.commands.get(&name) {
            return Err(file.model_error_at(
                tokens[0],
                format!(
                    "Command name '{}' used more than once. Previously used at line {}.",
                    name, previous.location.line
                ),
            ));
        }

        let app_name = file.token_text(tokens[1]).to_string();
        if !sys.apps.contains_key(&app_name) {
            return Err(file.model_error_at(
                tokens[1],
                format!("App '{}' is not in the system.", app_name),
            ));
        }

        let exe_path = file.token_text(tokens[2]).to_string();
        if !path::is_absolute(&exe_path) {
            return Err(file.model_error_at(
                tokens[2],
                "Command executable path inside app must begin with '/'.",
            ));
        }

        sys.commands.insert(
            name.clone(),
            Command {
                name,
                app_name,
                exe_path,
                location: file.location(item.first),
            },
        );
    }
    Ok(())
}

fn model_kernel_modules(
    sys: &mut System,
    file: &DefFile,
    section: &TokenListItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    for &token in &section.contents {
        let module_spec = super::substituted_text(file, token)?;
        let mdef_path = if path::has_suffix(&module_spec, ".mdef") {
            module_spec.clone()
        } else {
            format!("{}.mdef", module_spec)
        };
        let found = system::find_file(&mdef_path, &build_params.source_dirs).ok_or_else(|| {
            file.model_error_at(
                token,
                format!("Can't find definition file (.mdef) for module '{}'.", module_spec),
            )
        })?;

        let module = get_module(&path::to_string(&found), build_params)?;
        if sys.modules.contains_key(&module.name) {
            return Err(file.model_error_at(
                token,
                format!("Module '{}' added to the system more than once.", module.name),
            ));
        }
        sys.modules.insert(module.name.clone(), module);
    }
    Ok(())
}

/// Make every client interface in the system satisfied: bound, external
/// (and bound at system level), optional, or auto-bound.
fn ensure_client_interfaces_bound(model: &Model, sys: &mut System) -> Result<(), Error> {
    for app in sys.apps.values_mut() {
        super::ensure_client_interfaces_satisfied(model, app)?;
    }
    Ok(())
}

/// Get a conceptual model for the system described by a .sdef file.
///
/// The search directories named in the .sdef's `*Search:` sections are
/// appended to the build parameters before any app is modelled.
pub fn get_system(
    model: &mut Model,
    sdef_path: &str,
    build_params: &mut BuildParams,
) -> Result<System, Error> {
    let file = parser::sdef::parse(sdef_path, build_params.be_verbose)?;

    let mut sys = System::new(sdef_path);

    if build_params.be_verbose {
        system::verboseln!(
            "Modelling",
            "system: '{}' defined in: '{}'",
            sys.name,
            file.path()
        );
    }

    // First pass: gather search directories so the apps: section can use
    // them no matter where it appears.
    for section in &file.sections {
        let section_name = file.token_text(section.name_token());
        let dirs = match section_name {
            "appSearch" | "componentSearch" | "moduleSearch" => &mut build_params.source_dirs,
            "interfaceSearch" => &mut build_params.interface_dirs,
            _ => continue,
        };
        if let Item::Tokens(tokens) = section {
            for &token in &tokens.contents {
                let dir = super::substituted_text(&file, token)?;
                if !dir.is_empty() {
                    dirs.push(dir);
                }
            }
        }
    }

    // Bindings and commands are modelled once every app exists.
    let mut bindings_items: Vec<&TokenListItem> = Vec::new();
    let mut commands_items: Vec<&TokenListItem> = Vec::new();

    for section in &file.sections {
        let name_token = section.name_token();
        let section_name = file.token_text(name_token).to_string();

        match (section_name.as_str(), section) {
            ("apps", Item::Complex(complex)) => {
                for item in &complex.items {
                    let app_item = item.as_complex().ok_or_else(|| {
                        file.model_error_at(complex.first, "Internal error: malformed apps entry.")
                    })?;
                    model_app(model, &mut sys, &file, app_item, build_params)?;
                }
            }
            ("bindings", Item::Complex(complex)) => {
                for item in &complex.items {
                    if let Item::Tokens(tokens) = item {
                        bindings_items.push(tokens);
                    }
                }
            }
            ("commands", Item::Complex(complex)) => {
                for item in &complex.items {
                    if let Item::Tokens(tokens) = item {
                        commands_items.push(tokens);
                    }
                }
            }
            ("kernelModules" | "kernelModule", Item::Tokens(tokens)) => {
                model_kernel_modules(&mut sys, &file, tokens, build_params)?;
            }
            ("appSearch" | "componentSearch" | "interfaceSearch" | "moduleSearch", _) => {}
            _ => {
                return Err(file.model_error_at(
                    name_token,
                    format!("Internal error: Unrecognized section '{}'.", section_name),
                ));
            }
        }
    }

    model_bindings_section(model, &mut sys, &file, &bindings_items, build_params.be_verbose)?;

    ensure_client_interfaces_bound(model, &mut sys)?;

    model_commands_section(&mut sys, &file, &commands_items)?;

    Ok(sys)
}
