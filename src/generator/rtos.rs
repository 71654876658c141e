//! RTOS system generation: tasks.c and the linker script

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::buildparams::{BuildParams, CompilerFamily};
use crate::model::{priority, Model, Priority, System};
use crate::system::{self, path, Error};

/// Mangle a dotted interface instance name into a C symbol.
pub fn interface_name_to_symbol(interface_name: &str) -> String {
    format!("_ipc_{}", path::get_identifier_safe_name(interface_name))
}

/// The LE_THREAD_PRIORITY_... constant for a task's start priority.
fn priority_constant(start_priority: &Priority) -> String {
    match start_priority.numerical_value().unwrap_or(priority::MEDIUM) {
        priority::IDLE => "LE_THREAD_PRIORITY_IDLE".to_string(),
        priority::LOW => "LE_THREAD_PRIORITY_LOW".to_string(),
        priority::MEDIUM => "LE_THREAD_PRIORITY_MEDIUM".to_string(),
        priority::HIGH => "LE_THREAD_PRIORITY_HIGH".to_string(),
        rt => format!("LE_THREAD_PRIORITY_RT_{}", rt),
    }
}

/// The entry point symbol for one exe's generated main.
fn exe_entry_point(app_name: &str, exe_name: &str) -> String {
    format!("_{}_{}_Main", app_name, exe_name)
}

/// The per-exe init function that advertises its services.
fn exe_init_func(app_name: &str, exe_name: &str) -> String {
    format!("_{}_{}_Init", app_name, exe_name)
}

/// Generate a tasks.c describing every app task in the system, the app
/// list for the micro-supervisor, CLI command registration and the
/// all-services init function.
pub fn generate_system_tasks(
    _model: &Model,
    sys: &System,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let source_file = path::combine(&build_params.working_dir, "src/tasks.c");
    system::ensure_directory(path::get_containing_dir(&source_file))?;

    let mut out = String::new();
    let _ = write!(
        out,
        "\n\
         // Tasks for system '{}'.\n\
         // This is a generated file, do not edit.\n\
         \n\
         #include \"legato.h\"\n\
         #include \"microSupervisor.h\"\n\
         \n\
         \n",
        sys.name
    );

    // Forward declarations for every entry point.
    for (app_name, app) in &sys.apps {
        for exe_name in app.executables.keys() {
            let _ = writeln!(
                out,
                "extern void* {}(void* args);",
                exe_entry_point(app_name, exe_name)
            );
        }
    }
    out.push('\n');

    // Per-app task lists.
    for (app_name, app) in &sys.apps {
        let app_tasks_name = format!("{}Tasks", app_name);

        let _ = write!(
            out,
            "////////////////////////////////////////////////////////////////\n\
             // Tasks for app '{}'\n",
            app_name
        );

        for proc_env in &app.process_envs {
            for process in &proc_env.processes {
                let arg_list_name = format!("_{}_{}_Args", app_name, process.name());
                let _ = write!(
                    out,
                    "// Arguments for process {}\n\
                     static const char* {}[] =\n\
                     {{\n",
                    process.name(),
                    arg_list_name
                );
                for arg in &process.args {
                    let _ = writeln!(out, "    \"{}\",", arg);
                }
                out.push_str("    NULL\n};\n");
            }
        }

        let _ = write!(
            out,
            "// Task list for all processes in app\n\
             static Task_t {}[] =\n\
             {{\n",
            app_tasks_name
        );
        for proc_env in &app.process_envs {
            for process in &proc_env.processes {
                let exe_name = crate::model::Exe::name_from_path(&process.exe_path);
                let _ = write!(
                    out,
                    "    {{\n\
                     \x20       .nameStr = \"{}\",\n\
                     \x20       .priority = {},\n\
                     \x20       .entryPoint = {},\n\
                     \x20       .defaultArgc = {},\n\
                     \x20       .defaultArgv = _{}_{}_Args\n\
                     \x20   }},\n",
                    process.name(),
                    priority_constant(proc_env.start_priority()),
                    exe_entry_point(app_name, &exe_name),
                    process.args.len(),
                    app_name,
                    process.name()
                );
            }
        }
        out.push_str("};\n\n");

        let _ = writeln!(
            out,
            "// ThreadInfo list for app '{}'\nstatic TaskInfo_t* {}TaskInfo[{}];",
            app_name,
            app_name,
            app.executables.len()
        );
    }

    // The micro-supervisor walks this NULL-terminated app list.
    let _ = write!(
        out,
        "// App list for system '{}'\n\
         /* global */ const App_t _le_supervisor_SystemApps[] =\n\
         {{\n",
        sys.name
    );
    for (app_name, app) in &sys.apps {
        let _ = write!(
            out,
            "    {{\n\
             \x20       .appNameStr = \"{}\",\n\
             \x20       .manualStart = {},\n\
             \x20       .taskCount = {},\n\
             \x20       .taskList = {}Tasks,\n\
             \x20       .threadList = {}TaskInfo,\n\
             \x20   }},\n",
            app_name,
            if app.start_trigger == crate::model::StartTrigger::Manual {
                "true"
            } else {
                "false"
            },
            app.executables.len(),
            app_name,
            app_name
        );
    }
    out.push_str(
        "    {\n\
         \x20       .appNameStr = NULL\n\
         \x20   }\n\
         };\n\
         \n",
    );

    // CLI commands declared in the .sdef.
    out.push_str("// CLI command list, if any\n");
    for command in sys.commands.values() {
        let component = &command.exe_path[1..];
        let _ = writeln!(
            out,
            "LE_RTOS_CLI_DEFINECMD({}, {}, \"{}\",\n    \"Legato '{}' command\");",
            command.app_name, component, command.name, command.name
        );
    }
    out.push('\n');

    for (app_name, app) in &sys.apps {
        for exe_name in app.executables.keys() {
            let _ = writeln!(out, "void {}(void);", exe_init_func(app_name, exe_name));
        }
    }

    let _ = write!(
        out,
        "\n\
         /**\n\
         \x20* Initialize all services in system.\n\
         \x20*/\n\
         void _le_supervisor_InitAllServices\n\
         (\n\
         \x20   void\n\
         )\n\
         {{\n"
    );
    for (app_name, app) in &sys.apps {
        for exe_name in app.executables.keys() {
            let _ = writeln!(out, "    {}();", exe_init_func(app_name, exe_name));
        }
    }
    out.push_str("\n    // Any CLI command registration will follow\n");
    for command in sys.commands.values() {
        let component = &command.exe_path[1..];
        let _ = writeln!(
            out,
            "    le_rtos_cli_RegisterCommand(&LE_RTOS_CLI_CMD({}, {}));",
            command.app_name, component
        );
    }
    out.push_str("}\n");

    system::write_file(&source_file, out)
}

/// Service symbols that some client binds to but no server provides.
/// Optional bindings land here, and must still link.
fn get_needed_symbols(sys: &System) -> BTreeSet<String> {
    let mut needed = BTreeSet::new();

    for app in sys.apps.values() {
        for exe in app.executables.values() {
            for instance in &exe.component_instances {
                for client in &instance.client_apis {
                    match &client.binding {
                        Some(binding) => {
                            needed.insert(interface_name_to_symbol(&binding.server_if));
                        }
                        // Optional interfaces may be unbound; their own
                        // service symbol must still resolve (to NULL).
                        None => {
                            needed.insert(interface_name_to_symbol(&client.name));
                        }
                    }
                }
            }
        }
    }

    for app in sys.apps.values() {
        for exe in app.executables.values() {
            for instance in &exe.component_instances {
                for server in &instance.server_apis {
                    needed.remove(&interface_name_to_symbol(&server.name));
                }
            }
        }
    }

    needed
}

fn generate_gcc_linker_script(out: &mut String, sys: &System) {
    out.push_str(
        "/*\n\
         \x20* Auto-generated file.  Do not edit.\n\
         \x20*/\n",
    );

    // NULL weak definitions keep unsatisfied (e.g. optional) bindings
    // linking cleanly.
    for symbol in get_needed_symbols(sys) {
        let _ = writeln!(out, "PROVIDE({} = 0);", symbol);
    }
}

fn generate_arm_linker_script(out: &mut String) {
    out.push_str(
        "#\n\
         # Auto-generated file.  Do not edit.\n\
         #\n\
         HIDE *\n\
         SHOW le_microSupervisor_Main\n",
    );
}

/// Generate the RTOS linker script (`src/legato.ld`) for the system.
pub fn generate_linker_script(
    _model: &Model,
    sys: &System,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let script_file = path::combine(&build_params.working_dir, "src/legato.ld");
    system::ensure_directory(path::get_containing_dir(&script_file))?;

    let mut out = String::new();
    match build_params.compiler_family {
        CompilerFamily::Gcc => generate_gcc_linker_script(&mut out, sys),
        CompilerFamily::ArmRvct => generate_arm_linker_script(&mut out),
    }

    system::write_file(&script_file, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_identifier_safe() {
        assert_eq!(
            interface_name_to_symbol("myExe.myComp.le_gpio"),
            "_ipc_myExe_myComp_le_gpio"
        );
    }
}
