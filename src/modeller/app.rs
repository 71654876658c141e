//! Application modelling

use crate::buildparams::BuildParams;
use crate::envvars;
use crate::model::{
    AgentType, App, Binding, ClientIfRef, Exe, Model, PreBuiltInterface, Priority, Process,
    ProcessEnv, ServerIfRef, StartTrigger,
};
use crate::parse_tree::{ComplexItem, DefFile, Item, ItemKind, TokenId, TokenKind, TokenListItem};
use crate::parser;
use crate::system::{self, path, Error};

use super::component::{add_component_instance, get_api_file, get_component};

fn add_bundled_items(app: &mut App, file: &DefFile, section: &ComplexItem) -> Result<(), Error> {
    for subsection in &section.items {
        let subsection = subsection.as_complex().ok_or_else(|| {
            file.model_error_at(section.first, "Internal error: malformed bundles section.")
        })?;
        for item in &subsection.items {
            let item = item.as_tokens().ok_or_else(|| {
                file.model_error_at(subsection.first, "Internal error: malformed bundled item.")
            })?;
            let mut fs_object = super::get_bundled_item(file, item)?;

            // Relative sources are relative to the directory containing the
            // .adef file.
            if !path::is_absolute(&fs_object.src_path) {
                fs_object.src_path = path::combine(&app.dir, &fs_object.src_path);
            }

            match item.kind {
                ItemKind::BundledFile => {
                    if system::file_exists(&fs_object.src_path) {
                        app.bundled_files.push(fs_object);
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
                        app.bundled_dirs.push(fs_object);
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

/// Resolve a component reference from an `executables:` or `components:`
/// entry.  Returns None when substitution produced an empty string.
fn resolve_component(
    model: &mut Model,
    app: &App,
    file: &DefFile,
    token: TokenId,
    build_params: &BuildParams,
) -> Result<Option<crate::model::ComponentId>, Error> {
    let component_path = super::substituted_text(file, token)?;
    if component_path.is_empty() {
        return Ok(None);
    }

    let found = system::find_component(&component_path, &[&app.dir])
        .or_else(|| system::find_component(&component_path, &build_params.source_dirs))
        .ok_or_else(|| {
            file.model_error_at(
                token,
                format!("Couldn't find component '{}'.", component_path),
            )
        })?;

    let id = get_component(model, &path::to_string(&found), build_params)?;
    Ok(Some(id))
}

fn add_components(
    model: &mut Model,
    app: &mut App,
    file: &DefFile,
    section: &TokenListItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    for &token in &section.contents {
        if let Some(id) = resolve_component(model, app, file, token, build_params)? {
            app.components.insert(id);
        }
    }
    Ok(())
}

fn add_executables(
    model: &mut Model,
    app: &mut App,
    file: &DefFile,
    section: &ComplexItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    for item in &section.items {
        let item = item.as_tokens().ok_or_else(|| {
            file.model_error_at(section.first, "Internal error: malformed executables section.")
        })?;
        let exe_name = file.token_text(item.first).to_string();

        if build_params.be_verbose {
            system::verboseln!(
                "Modelling",
                "Application '{}' contains executable '{}'.",
                app.name,
                exe_name
            );
        }

        let mut exe = Exe::new(
            &format!("staging/read-only/bin/{}", exe_name),
            file.location(item.first),
        );

        for &token in &item.contents {
            if let Some(component) = resolve_component(model, app, file, token, build_params)? {
                add_component_instance(model, &mut exe, component);
            }
        }

        if exe.has_java_code {
            exe.path.push_str(".jar");
        }

        // An executable with no compilable components would just sit there.
        if !exe.has_c_or_cpp_code && !exe.has_java_code && !exe.has_python_code {
            return Err(file.model_error_at(
                item.first,
                "Executable doesn't contain any components that have source code files.",
            ));
        }

        for instance in &exe.component_instances {
            app.components.insert(instance.component);
        }

        if app.executables.contains_key(&exe.name) {
            return Err(file.model_error_at(
                item.first,
                format!("Duplicate executable found: {}", exe.name),
            ));
        }
        app.executables.insert(exe.name.clone(), exe);
    }
    Ok(())
}

/// Look up a component instance by exe and component name; returns the exe
/// name and instance index.
fn find_component_instance(
    model: &Model,
    app: &App,
    file: &DefFile,
    exe_token: TokenId,
    component_token: TokenId,
) -> Result<(String, usize), Error> {
    let exe_name = file.token_text(exe_token);
    let component_name = file.token_text(component_token);

    let exe = app.executables.get(exe_name).ok_or_else(|| {
        file.model_error_at(
            exe_token,
            format!("Executable '{}' not defined in application.", exe_name),
        )
    })?;

    for (index, instance) in exe.component_instances.iter().enumerate() {
        if model.component(instance.component).name == component_name {
            return Ok((exe_name.to_string(), index));
        }
    }

    Err(file.model_error_at(
        component_token,
        format!(
            "Component '{}' not found in executable '{}'.",
            component_name, exe_name
        ),
    ))
}

fn find_client_interface(
    model: &Model,
    app: &App,
    file: &DefFile,
    exe_token: TokenId,
    component_token: TokenId,
    interface_token: TokenId,
) -> Result<ClientIfRef, Error> {
    let (exe_name, instance_index) =
        find_component_instance(model, app, file, exe_token, component_token)?;
    let interface_name = file.token_text(interface_token);

    let instance = &app.executables[&exe_name].component_instances[instance_index];
    let component = model.component(instance.component);
    for (index, if_instance) in instance.client_apis.iter().enumerate() {
        if component.client_apis[if_instance.api_index].internal_name == interface_name {
            return Ok(ClientIfRef {
                exe: exe_name,
                instance: instance_index,
                interface: index,
            });
        }
    }

    Err(file.model_error_at(
        interface_token,
        format!(
            "Client interface '{}' not found in component '{}' in executable '{}'.",
            interface_name,
            file.token_text(component_token),
            exe_name
        ),
    ))
}

fn find_server_interface(
    model: &Model,
    app: &App,
    file: &DefFile,
    exe_token: TokenId,
    component_token: TokenId,
    interface_token: TokenId,
) -> Result<ServerIfRef, Error> {
    let (exe_name, instance_index) =
        find_component_instance(model, app, file, exe_token, component_token)?;
    let interface_name = file.token_text(interface_token);

    let instance = &app.executables[&exe_name].component_instances[instance_index];
    let component = model.component(instance.component);
    for (index, if_instance) in instance.server_apis.iter().enumerate() {
        if component.server_apis[if_instance.api_index].internal_name == interface_name {
            return Ok(ServerIfRef {
                exe: exe_name,
                instance: instance_index,
                interface: index,
            });
        }
    }

    Err(file.model_error_at(
        interface_token,
        format!(
            "Server interface '{}' not found in component '{}' in executable '{}'.",
            interface_name,
            file.token_text(component_token),
            exe_name
        ),
    ))
}

/// Mark a single interface instance as externally visible, optionally under
/// a new name.  Token order: (external name, exe, component, interface).
fn make_interface_external(
    model: &Model,
    app: &mut App,
    file: &DefFile,
    name_token: TokenId,
    exe_token: TokenId,
    component_token: TokenId,
    interface_token: TokenId,
) -> Result<(), Error> {
    let name = file.token_text(name_token).to_string();

    // External names share one namespace across client and server sides.
    if app.extern_client_interfaces.contains_key(&name)
        || app.extern_server_interfaces.contains_key(&name)
    {
        return Err(file.model_error_at(
            name_token,
            format!("Duplicate external interface name: '{}'.", name),
        ));
    }

    let client = find_client_interface(model, app, file, exe_token, component_token, interface_token);
    match client {
        Ok(if_ref) => {
            let location = file.location(name_token);
            let instance = app.client_interface_mut(&if_ref);
            if let Some(mark) = &instance.extern_mark {
                return Err(file.model_error_at(
                    name_token,
                    format!(
                        "Same interface marked 'extern' more than once. Previously done at \
                         line {}.",
                        mark.line
                    ),
                ));
            }
            instance.extern_mark = Some(location);
            instance.is_external = true;
            instance.name = name.clone();
            app.extern_client_interfaces.insert(name, if_ref);
            Ok(())
        }
        Err(_) => {
            // Not a client interface; try the server side (reporting the
            // server-side error if both lookups fail).
            let if_ref = find_server_interface(
                model,
                app,
                file,
                exe_token,
                component_token,
                interface_token,
            )?;
            let location = file.location(name_token);
            let instance = app.server_interface_mut(&if_ref);
            if let Some(mark) = &instance.extern_mark {
                return Err(file.model_error_at(
                    name_token,
                    format!(
                        "Same interface marked 'extern' more than once. Previously done at \
                         line {}.",
                        mark.line
                    ),
                ));
            }
            instance.extern_mark = Some(location);
            instance.is_external = true;
            instance.name = name.clone();
            app.extern_server_interfaces.insert(name, if_ref);
            Ok(())
        }
    }
}

fn make_interfaces_external(
    model: &Model,
    app: &mut App,
    file: &DefFile,
    items: &[&TokenListItem],
) -> Result<(), Error> {
    for item in items {
        let tokens = &item.contents;
        if tokens.len() == 4 {
            make_interface_external(
                model, app, file, tokens[0], tokens[1], tokens[2], tokens[3],
            )?;
        } else {
            // No alias: exported under the interface's internal name.
            make_interface_external(
                model, app, file, tokens[2], tokens[0], tokens[1], tokens[2],
            )?;
        }
    }
    Ok(())
}

/// Model `requires:` / `provides:` subsections of the `extern:` section:
/// IPC interfaces on pre-built binaries bundled into the app.
fn model_pre_built_interfaces(
    model: &mut Model,
    app: &mut App,
    file: &DefFile,
    section: &ComplexItem,
    build_params: &BuildParams,
) -> Result<(), Error> {
    for subsection in &section.items {
        let Some(subsection) = subsection.as_complex() else {
            continue; // plain extern interface items are handled separately
        };
        for item in &subsection.items {
            let item = item.as_tokens().ok_or_else(|| {
                file.model_error_at(subsection.first, "Internal error: malformed extern item.")
            })?;

            let mut alias = None;
            let mut index = 0;
            if matches!(
                file.token(item.contents[0]).kind,
                TokenKind::Name | TokenKind::DottedName
            ) {
                alias = Some(file.token_text(item.contents[0]).to_string());
                index = 1;
            }
            let path_token = item.contents[index];
            let raw = super::substituted_text(file, path_token)?;
            let api_path = system::find_file(&raw, &build_params.interface_dirs)
                .ok_or_else(|| {
                    file.model_error_at(path_token, format!("Couldn't find file '{}'.", raw))
                })?;
            let api_file =
                get_api_file(model, &path::to_string(&api_path), &build_params.interface_dirs)?;

            let interface_name =
                alias.unwrap_or_else(|| model.api_file(api_file).default_prefix.clone());

            let interface = PreBuiltInterface {
                api_file,
                name: interface_name.clone(),
                binding: None,
            };
            match item.kind {
                ItemKind::RequiredApi => {
                    app.pre_built_client_interfaces
                        .insert(interface_name, interface);
                }
                ItemKind::ProvidedApi => {
                    app.pre_built_server_interfaces
                        .insert(interface_name, interface);
                }
                _ => {
                    return Err(file.model_error_at(
                        item.first,
                        "Internal error: unexpected item in extern section.",
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Extract the server half of a binding spec starting at `start`.
fn get_binding_server_side(
    model: &Model,
    app: &App,
    file: &DefFile,
    tokens: &[TokenId],
    start: usize,
) -> Result<(AgentType, String, String), Error> {
    let agent_token = tokens[start];

    if file.token(agent_token).kind == TokenKind::IpcAgent {
        let agent_name = file.token_text(agent_token);
        let if_name = file.token_text(tokens[start + 1]).to_string();
        if agent_name.starts_with('<') {
            Ok((
                AgentType::ExternalUser,
                super::remove_angle_brackets(agent_name).to_string(),
                if_name,
            ))
        } else {
            Ok((AgentType::ExternalApp, agent_name.to_string(), if_name))
        }
    } else {
        // exe.component.interface on some exe built into this app.
        let server_ref = find_server_interface(
            model,
            app,
            file,
            tokens[start],
            tokens[start + 1],
            tokens[start + 2],
        )?;
        let server_if_name = app.server_interface(&server_ref).name.clone();
        Ok((AgentType::Internal, app.name.clone(), server_if_name))
    }
}

fn add_bindings(
    model: &Model,
    app: &mut App,
    file: &DefFile,
    items: &[&TokenListItem],
) -> Result<(), Error> {
    for item in items {
        let tokens = &item.contents;

        if file.token(tokens[0]).kind == TokenKind::Star {
            // Wildcard binding of a pre-built client interface:
            //   *.clientIf -> server...
            let client_if_name = file.token_text(tokens[1]).to_string();
            let (server_type, server_agent, server_if) =
                get_binding_server_side(model, app, file, tokens, 2)?;

            let binding = Binding {
                client_type: AgentType::Internal,
                client_agent: app.name.clone(),
                client_if: client_if_name.clone(),
                server_type,
                server_agent,
                server_if,
                location: file.location(item.first),
            };

            let interface = app
                .pre_built_client_interfaces
                .get_mut(&client_if_name)
                .ok_or_else(|| {
                    file.model_error_at(
                        tokens[1],
                        format!(
                            "No such client-side pre-built interface '{}'.",
                            client_if_name
                        ),
                    )
                })?;
            if let Some(previous) = &interface.binding {
                return Err(file.model_error_at(
                    tokens[1],
                    format!(
                        "Duplicate binding of pre-built client-side interface '{}'. Previous \
                         binding is at line {}.",
                        client_if_name, previous.location.line
                    ),
                ));
            }
            interface.binding = Some(binding);
        } else {
            // Normal binding: exe.component.interface -> server...
            let client_ref =
                find_client_interface(model, app, file, tokens[0], tokens[1], tokens[2])?;
            let client_if_name = app.client_interface(&client_ref).name.clone();
            let (server_type, server_agent, server_if) =
                get_binding_server_side(model, app, file, tokens, 3)?;

            let binding = Binding {
                client_type: AgentType::Internal,
                client_agent: app.name.clone(),
                client_if: client_if_name,
                server_type,
                server_agent,
                server_if,
                location: file.location(item.first),
            };

            let instance = app.client_interface_mut(&client_ref);
            if instance.binding.is_some() {
                return Err(
                    file.model_error_at(tokens[0], "Client interface bound more than once.")
                );
            }
            instance.binding = Some(binding);
        }
    }
    Ok(())
}

fn add_processes(proc_env: &mut ProcessEnv, file: &DefFile, run: &ComplexItem) -> Result<(), Error> {
    for item in &run.items {
        let item = item.as_tokens().ok_or_else(|| {
            file.model_error_at(run.first, "Internal error: malformed run entry.")
        })?;

        let mut process = Process::new(file.location(item.first));

        // If the first token is an open parenthesis, no process name was
        // given and the exe path doubles as the name.
        let mut tokens = item.contents.iter();
        let named = file.token(item.first).kind != TokenKind::OpenParen;
        let first_content = *tokens.next().ok_or_else(|| {
            file.model_error_at(item.first, "Internal error: empty run entry.")
        })?;
        process.set_name(&path::unquote(file.token_text(first_content)))?;
        let exe_token = if named {
            *tokens.next().ok_or_else(|| {
                file.model_error_at(item.first, "Internal error: run entry missing exe path.")
            })?
        } else {
            first_content
        };
        process.exe_path = path::unquote(file.token_text(exe_token));

        for &arg in tokens {
            process.args.push(path::unquote(file.token_text(arg)));
        }

        proc_env.processes.push(process);
    }
    Ok(())
}

fn add_processes_section(
    app: &mut App,
    file: &DefFile,
    section: &ComplexItem,
) -> Result<(), Error> {
    let mut proc_env = ProcessEnv::default();

    for subsection in &section.items {
        let name_token = subsection.name_token();
        let subsection_name = file.token_text(name_token).to_string();

        match (subsection_name.as_str(), subsection) {
            ("run", Item::Complex(run)) => add_processes(&mut proc_env, file, run)?,
            ("envVars", Item::Complex(env_vars)) => {
                for item in &env_vars.items {
                    let item = item.as_tokens().ok_or_else(|| {
                        file.model_error_at(env_vars.first, "Internal error: malformed envVars.")
                    })?;
                    let name = file.token_text(item.first).to_string();
                    let value = super::substituted_text(file, item.contents[0])?;
                    proc_env.env_vars.insert(name, value);
                }
            }
            ("faultAction", Item::Tokens(tokens)) => {
                let text = file.token_text(tokens.contents[0]);
                proc_env.fault_action = Some(
                    crate::model::FaultAction::parse(text)
                        .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?,
                );
            }
            ("priority", Item::Tokens(tokens)) => {
                let text = file.token_text(tokens.contents[0]);
                let priority = Priority::parse(text)
                    .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?;
                proc_env.set_start_priority(priority);
            }
            ("maxPriority", Item::Tokens(tokens)) => {
                let text = file.token_text(tokens.contents[0]);
                let priority = Priority::parse(text)
                    .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?;
                proc_env.set_max_priority(priority);
            }
            ("maxCoreDumpFileBytes", Item::Tokens(tokens)) => {
                proc_env
                    .max_core_dump_file_bytes
                    .set(super::get_non_negative_int(file, tokens)?);
            }
            ("maxFileBytes", Item::Tokens(tokens)) => {
                proc_env
                    .max_file_bytes
                    .set(super::get_non_negative_int(file, tokens)?);
            }
            ("maxFileDescriptors", Item::Tokens(tokens)) => {
                proc_env
                    .max_file_descriptors
                    .set(super::get_positive_int(file, tokens)?);
            }
            ("maxLockedMemoryBytes", Item::Tokens(tokens)) => {
                proc_env
                    .max_locked_memory_bytes
                    .set(super::get_non_negative_int(file, tokens)?);
            }
            ("watchdogAction", Item::Tokens(tokens)) => {
                let text = file.token_text(tokens.contents[0]);
                proc_env.watchdog_action = Some(
                    crate::model::WatchdogAction::parse(text)
                        .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?,
                );
            }
            ("watchdogTimeout", Item::Tokens(tokens)) => {
                proc_env.watchdog_timeout = Some(super::get_watchdog_timeout(file, tokens)?);
            }
            _ => {
                return Err(file.model_error_at(
                    name_token,
                    format!("Internal error: Unrecognized section '{}'.", subsection_name),
                ));
            }
        }
    }

    app.process_envs.push(proc_env);
    Ok(())
}

fn add_config_tree(app: &mut App, file: &DefFile, item: &TokenListItem) -> Result<(), Error> {
    let mut contents = item.contents.iter();
    let first = *contents.next().ok_or_else(|| {
        file.model_error_at(item.first, "Internal error: empty configTree item.")
    })?;

    let (permissions, tree_token) = if file.token(first).kind == TokenKind::FilePermissions {
        let tree = *contents.next().ok_or_else(|| {
            file.model_error_at(item.first, "Internal error: configTree item missing name.")
        })?;
        (super::get_permissions(file.token_text(first)), tree)
    } else {
        (crate::model::Permissions::read_only(), first)
    };

    // '.' names the app's own tree.
    let tree_name = if file.token(tree_token).kind == TokenKind::Dot {
        app.name.clone()
    } else {
        file.token_text(tree_token).to_string()
    };

    if app.config_trees.contains_key(&tree_name) {
        return Err(file.model_error_at(
            tree_token,
            format!(
                "Configuration tree '{}' appears in application more than once.",
                tree_name
            ),
        ));
    }
    app.config_trees.insert(tree_name, permissions);
    Ok(())
}

fn add_required_items(app: &mut App, file: &DefFile, section: &ComplexItem) -> Result<(), Error> {
    for subsection in &section.items {
        let subsection = match subsection.as_complex() {
            Some(subsection) => subsection,
            None => continue, // deprecated requires: api: items handled by caller
        };
        let subsection_name = file.token_text(subsection.name).to_string();
        for item in &subsection.items {
            let item = match item.as_tokens() {
                Some(item) => item,
                None => continue,
            };
            match subsection_name.as_str() {
                "file" => app
                    .required_files
                    .push(super::get_required_file_or_dir(file, item)?),
                "dir" => app
                    .required_dirs
                    .push(super::get_required_file_or_dir(file, item)?),
                "device" => app
                    .required_devices
                    .push(super::get_required_device(file, item)?),
                "configTree" => add_config_tree(app, file, item)?,
                "api" => {} // deprecated; collected as extern items by the caller
                _ => {
                    return Err(file.model_error_at(
                        subsection.name,
                        format!("INTERNAL ERROR: Unrecognized section '{}'.", subsection_name),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn set_start(app: &mut App, file: &DefFile, tokens: &TokenListItem) -> Result<(), Error> {
    let value = tokens.contents[0];
    match file.token_text(value) {
        "auto" => app.start_trigger = StartTrigger::Auto,
        "manual" => app.start_trigger = StartTrigger::Manual,
        text => {
            return Err(file.model_error_at(
                value,
                format!("Unrecognized start mode '{}'. Expected 'auto' or 'manual'.", text),
            ));
        }
    }
    Ok(())
}

/// Any process environment without an explicit PATH gets the default, which
/// depends on whether the app is sandboxed.
fn ensure_path_is_set(app: &mut App) {
    let mut default_path = "/usr/local/bin:/usr/bin:/bin".to_string();
    if !app.is_sandboxed {
        default_path = format!(
            "/legato/systems/current/apps/{}/read-only/bin:{}",
            app.name, default_path
        );
    }

    for proc_env in &mut app.process_envs {
        if !proc_env.env_vars.contains_key("PATH") {
            proc_env
                .env_vars
                .insert("PATH".to_string(), default_path.clone());
        }
    }
}

/// Collect extern API interface items from an `extern:` section (or from
/// the deprecated `requires: api:` / `provides: api:` forms).
fn collect_extern_interfaces<'a>(section: &'a ComplexItem, out: &mut Vec<&'a TokenListItem>) {
    for item in &section.items {
        match item {
            Item::Tokens(tokens) if tokens.kind == ItemKind::ExternApiInterface => {
                out.push(tokens);
            }
            Item::Complex(subsection) => {
                // Nested requires:/provides: subsections hold pre-built
                // interfaces, handled by model_pre_built_interfaces; the
                // deprecated provides: api: shape nests extern items one
                // level deeper.
                collect_extern_interfaces(subsection, out);
            }
            Item::Tokens(_) => {}
        }
    }
}

/// Get a conceptual model for the application described by a .adef file.
pub fn get_app(
    model: &mut Model,
    adef_path: &str,
    build_params: &BuildParams,
) -> Result<App, Error> {
    // Make $CURDIR available to the definition file while it is modelled.
    let old_curdir = envvars::get("CURDIR");
    envvars::set("CURDIR", &path::get_containing_dir(adef_path));

    let result = get_app_inner(model, adef_path, build_params);

    envvars::set("CURDIR", &old_curdir);
    result
}

fn get_app_inner(
    model: &mut Model,
    adef_path: &str,
    build_params: &BuildParams,
) -> Result<App, Error> {
    let file = parser::adef::parse(adef_path, build_params.be_verbose)?;

    let mut app = App::new(adef_path, crate::system::Location::new(adef_path, 1, 0));

    if build_params.be_verbose {
        system::verboseln!(
            "Modelling",
            "application: '{}' defined in: '{}'",
            app.name,
            file.path()
        );
    }

    // Bindings, processes and externs are modelled after everything else
    // has been instantiated.
    let mut bindings_sections: Vec<&TokenListItem> = Vec::new();
    let mut processes_sections: Vec<&ComplexItem> = Vec::new();
    let mut extern_interfaces: Vec<&TokenListItem> = Vec::new();
    let mut extern_sections: Vec<&ComplexItem> = Vec::new();

    for section in &file.sections {
        let name_token = section.name_token();
        let section_name = file.token_text(name_token).to_string();

        match (section_name.as_str(), section) {
            ("bindings", Item::Complex(complex)) => {
                for item in &complex.items {
                    if let Item::Tokens(tokens) = item {
                        bindings_sections.push(tokens);
                    }
                }
            }
            ("bundles", Item::Complex(complex)) => add_bundled_items(&mut app, &file, complex)?,
            ("components", Item::Tokens(tokens)) => {
                add_components(model, &mut app, &file, tokens, build_params)?;
            }
            ("cpuShare", Item::Tokens(tokens)) => {
                app.cpu_share.set(super::get_positive_int(&file, tokens)?);
            }
            ("executables", Item::Complex(complex)) => {
                add_executables(model, &mut app, &file, complex, build_params)?;
            }
            ("extern", Item::Complex(complex)) => {
                collect_extern_interfaces(complex, &mut extern_interfaces);
                extern_sections.push(complex);
            }
            ("groups", Item::Tokens(tokens)) => {
                for &token in &tokens.contents {
                    app.groups.insert(file.token_text(token).to_string());
                }
            }
            ("maxFileSystemBytes", Item::Tokens(tokens)) => {
                app.max_file_system_bytes
                    .set(super::get_non_negative_int(&file, tokens)?);
            }
            ("maxMemoryBytes", Item::Tokens(tokens)) => {
                app.max_memory_bytes
                    .set(super::get_positive_int(&file, tokens)?);
            }
            ("maxMQueueBytes", Item::Tokens(tokens)) => {
                app.max_mqueue_bytes
                    .set(super::get_non_negative_int(&file, tokens)?);
            }
            ("maxQueuedSignals", Item::Tokens(tokens)) => {
                app.max_queued_signals
                    .set(super::get_non_negative_int(&file, tokens)?);
            }
            ("maxThreads", Item::Tokens(tokens)) => {
                app.max_threads.set(super::get_positive_int(&file, tokens)?);
            }
            ("maxSecureStorageBytes", Item::Tokens(tokens)) => {
                app.max_secure_storage_bytes
                    .set(super::get_non_negative_int(&file, tokens)?);
            }
            ("processes", Item::Complex(complex)) => processes_sections.push(complex),
            ("provides", Item::Complex(complex)) => {
                // Deprecated form of extern:.
                collect_extern_interfaces(complex, &mut extern_interfaces);
            }
            ("requires", Item::Complex(complex)) => {
                add_required_items(&mut app, &file, complex)?;
                // Deprecated requires: api: items are extern interfaces.
                collect_extern_interfaces(complex, &mut extern_interfaces);
            }
            ("sandboxed", Item::Tokens(tokens)) => {
                app.is_sandboxed = file.token_text(tokens.contents[0]) != "false";
            }
            ("start", Item::Tokens(tokens)) => set_start(&mut app, &file, tokens)?,
            ("version", Item::Tokens(tokens)) => {
                app.version = file.token_text(tokens.contents[0]).to_string();
                if app.version.starts_with('$') {
                    app.version = envvars::do_substitution(&app.version)
                        .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?;
                }
            }
            ("watchdogAction", Item::Tokens(tokens)) => {
                let text = file.token_text(tokens.contents[0]);
                app.watchdog_action = Some(
                    crate::model::WatchdogAction::parse(text)
                        .map_err(|e| file.model_error_at(tokens.contents[0], e.to_string()))?,
                );
            }
            ("watchdogTimeout", Item::Tokens(tokens)) => {
                app.watchdog_timeout = Some(super::get_watchdog_timeout(&file, tokens)?);
            }
            _ => {
                return Err(file.model_error_at(
                    name_token,
                    format!("Internal error: Unrecognized section '{}'.", section_name),
                ));
            }
        }
    }

    for section in &processes_sections {
        add_processes_section(&mut app, &file, section)?;
    }

    // Pre-built interfaces must exist before externs and bindings refer to
    // them.
    for section in &extern_sections {
        model_pre_built_interfaces(model, &mut app, &file, section, build_params)?;
    }
    make_interfaces_external(model, &mut app, &file, &extern_interfaces)?;
    add_bindings(model, &mut app, &file, &bindings_sections)?;

    ensure_path_is_set(&mut app);

    Ok(app)
}
