//! Per-exe _main.c generation

use std::fmt::Write as _;

use crate::buildparams::BuildParams;
use crate::model::{Exe, Model};
use crate::system::{self, path, Error};

/// Generate the startup _main.c for an executable: service instance names,
/// library loading, logging registration and the event loop.
pub fn generate(model: &Model, exe: &Exe, build_params: &BuildParams) -> Result<(), Error> {
    let exe_name = &exe.name;
    let default_comp_name = exe.default_component_name();

    let source_file = path::combine(&build_params.working_dir, &exe.main_source_file());

    if build_params.be_verbose {
        system::verboseln!(
            "Generating",
            "startup code for executable '{}' ({}) in '{}'.",
            exe_name,
            exe.path,
            source_file
        );
    }

    system::ensure_directory(path::get_containing_dir(&source_file))?;

    let mut out = String::new();
    let _ = write!(
        out,
        "\n\
         // Startup code for the executable '{}'.\n\
         // This is a generated file, do not edit.\n\
         \n\
         #include \"legato.h\"\n\
         #include \"../liblegato/eventLoop.h\"\n\
         #include \"../liblegato/linux/logPlatform.h\"\n\
         #include \"../liblegato/log.h\"\n\
         #include <dlfcn.h>\n\
         \n\
         \n\
         // Define IPC API interface names.\n",
        exe_name
    );

    // One service-instance-name variable per interface instance, resolving
    // the externs in each component's _componentMain.c.
    for instance in &exe.component_instances {
        let component = model.component(instance.component);
        for if_instance in &instance.server_apis {
            let internal_name = &component.server_apis[if_instance.api_index].internal_name;
            let _ = writeln!(
                out,
                "LE_SHARED const char* _{}_{}_ServiceInstanceName = \"{}\";",
                component.name, internal_name, if_instance.name
            );
        }
        for if_instance in &instance.client_apis {
            let internal_name = &component.client_apis[if_instance.api_index].internal_name;
            let _ = writeln!(
                out,
                "LE_SHARED const char* _{}_{}_ServiceInstanceName = \"{}\";",
                component.name, internal_name, if_instance.name
            );
        }
    }

    let _ = write!(
        out,
        "\n\
         // Define default component's log session variables.\n\
         LE_SHARED le_log_SessionRef_t {comp}_LogSession;\n\
         LE_SHARED le_log_Level_t* {comp}_LogLevelFilterPtr;\n\
         \n",
        comp = default_comp_name
    );

    let _ = write!(
        out,
        "// Loads a library using dlopen().\n\
         __attribute__((unused)) static void LoadLib\n\
         (\n\
         \x20   const char* libName\n\
         )\n\
         {{\n\
         \x20   dlopen(libName, RTLD_LAZY | RTLD_GLOBAL);\n\
         \x20   const char* errorMsg = dlerror();\n\
         \x20   LE_FATAL_IF(errorMsg != NULL,\n\
         \x20               \"Failed to load library '%s' (%s)\",\
         \x20               libName,\n\
         \x20               errorMsg);\n\
         }}\n\
         \n\
         \n\
         int main(int argc, const char* argv[])\n\
         {{\n\
         \x20   // Pass the args to the Command Line Arguments API.\n\
         \x20   le_arg_SetArgs((size_t)argc, argv);\n\
         \x20   // Make stdout line buffered so printf shows up in logs without flushing.\n\
         \x20   setlinebuf(stdout);\n\
         \n\
         \x20   {comp}_LogSession = log_RegComponent(\"{comp}\", &{comp}_LogLevelFilterPtr);\n\
         \n\
         \x20   // Connect to the log control daemon.\n\
         \x20   // Note that there are some rare cases where we don't want the\n\
         \x20   // process to try to connect to the Log Control Daemon (e.g.,\n\
         \x20   // the Supervisor and the Service Directory shouldn't).\n\
         \x20   // The NO_LOG_CONTROL macro can be used to control that.\n\
         \x20   #ifndef NO_LOG_CONTROL\n\
         \x20       log_ConnectToControlDaemon();\n\
         \x20   #else\n\
         \x20       LE_DEBUG(\"Not connecting to the Log Control Daemon.\");\n\
         \x20   #endif\n\
         \n",
        comp = default_comp_name
    );

    // Load each component's shared libraries, bundled ones first.
    out.push_str("    // Load dynamic libraries.\n");
    for instance in &exe.component_instances {
        let component = model.component(instance.component);
        for bundled in &component.bundled_files {
            let file_name = path::get_last_node(&bundled.dest_path);
            if path::is_shared_library(&file_name) {
                let _ = writeln!(out, "    LoadLib(\"{}\");", file_name);
            }
        }
        if !component.lib.is_empty() {
            let _ = writeln!(out, "    LoadLib(\"{}\");", path::get_last_node(&component.lib));
        }
    }
    out.push('\n');

    let _ = write!(
        out,
        "\x20   // Set the Signal Fault handler\n\
         \x20   le_sig_InstallShowStackHandler();\n\
         \n\
         \x20   // Set the Signal Term handler\n\
         \x20   le_sig_InstallDefaultTermHandler();\n\
         \n\
         \x20   LE_DEBUG(\"== Starting Event Processing Loop ==\");\n\
         \x20   le_event_RunLoop();\n\
         \x20   LE_FATAL(\"== SHOULDN'T GET HERE! ==\");\n\
         }}\n"
    );

    system::write_file(&source_file, out)
}
