//! Per-component _componentMain.c generation

use std::fmt::Write as _;

use crate::buildparams::BuildParams;
use crate::model::{Component, Model};
use crate::system::{self, path, Error};

/// Emit the service-name variables for one interface.
///
/// For components built into executables, the variable is an extern
/// resolved by the exe's generated _main.c, allowing per-exe instance
/// naming.  Stand-alone components resolve the name to the internal name
/// directly.
fn define_service_name_vars(
    out: &mut String,
    component: &Component,
    internal_name: &str,
) {
    let if_level_var = format!("{}_ServiceInstanceNamePtr", internal_name);

    if !component.is_standalone {
        let exe_level_var = format!(
            "_{}_{}_ServiceInstanceName",
            component.name, internal_name
        );
        let _ = writeln!(out, "extern const char* {};", exe_level_var);
        let _ = writeln!(out, "const char** {} = &{};", if_level_var, exe_level_var);
    } else {
        let const_name = format!("{}_InterfaceName", internal_name);
        let _ = writeln!(
            out,
            "static const char* {} = \"{}\";",
            const_name, internal_name
        );
        let _ = writeln!(out, "const char** {} = &{};", if_level_var, const_name);
    }
}

/// Generate _componentMain.c for a component: service-name variable
/// definitions plus the library init function run by the dynamic loader.
pub fn generate(
    _model: &Model,
    component: &Component,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let comp_name = &component.name;

    let output_dir = path::minimize(&format!(
        "{}/{}/src",
        build_params.working_dir, component.working_dir
    ));
    let file_path = path::combine(&output_dir, "_componentMain.c");

    if build_params.be_verbose {
        system::verboseln!(
            "Generating",
            "component-specific IPC code for component '{}' in '{}'.",
            comp_name,
            file_path
        );
    }

    system::ensure_directory(&output_dir)?;

    let mut out = String::new();
    let _ = write!(
        out,
        "/*\n\
         * AUTO-GENERATED _componentMain.c for the {} component.\n\
         \n\
         * Don't bother hand-editing this file.\n\
         */\n\
         \n\
         #include \"legato.h\"\n\
         #include \"../liblegato/eventLoop.h\"\n\
         #include \"../liblegato/linux/logPlatform.h\"\n\
         #include \"../liblegato/log.h\"\n\
         \n\
         #ifdef __cplusplus\n\
         extern \"C\" {{\n\
         #endif\n\
         \n",
        comp_name
    );

    for interface in &component.client_apis {
        define_service_name_vars(&mut out, component, &interface.internal_name);
        let _ = writeln!(out, "void {}_ConnectService(void);", interface.internal_name);
    }
    for interface in &component.server_apis {
        define_service_name_vars(&mut out, component, &interface.internal_name);
        let _ = writeln!(
            out,
            "void {}_AdvertiseService(void);",
            interface.internal_name
        );
    }

    let _ = write!(
        out,
        "// Component log session variables.\n\
         le_log_SessionRef_t {comp}_LogSession;\n\
         le_log_Level_t* {comp}_LogLevelFilterPtr;\n\
         \n\
         // Declare component's COMPONENT_INIT_ONCE function,\n\
         // and provide default empty implementation.\n\
         __attribute__((weak))\n\
         void {init}_ONCE(void)\n\
         {{\n\
         }}\n\
         // Component initialization function (COMPONENT_INIT).\n\
         void {init}(void);\n\
         \n\
         // Library initialization function.\n\
         // Will be called by the dynamic linker loader when the library is loaded.\n\
         __attribute__((constructor)) void _{comp}_Init(void)\n\
         {{\n\
         \x20   LE_DEBUG(\"Initializing {comp} component library.\");\n\
         \n",
        comp = comp_name,
        init = component.init_func_name
    );

    // Advertise servers and connect clients, except those marked for
    // manual start.
    if !component.server_apis.is_empty() {
        out.push_str("    // Advertise server-side IPC interfaces.\n");
        for interface in &component.server_apis {
            if !interface.manual_start {
                let _ = writeln!(
                    out,
                    "    {}_AdvertiseService();",
                    interface.internal_name
                );
            } else {
                let _ = writeln!(
                    out,
                    "    // '{}' is [manual-start].",
                    interface.internal_name
                );
            }
        }
        out.push('\n');
    }

    if !component.client_apis.is_empty() {
        out.push_str("    // Connect client-side IPC interfaces.\n");
        for interface in &component.client_apis {
            if !interface.manual_start {
                let _ = writeln!(out, "    {}_ConnectService();", interface.internal_name);
            } else {
                let _ = writeln!(
                    out,
                    "    // '{}' is [manual-start].",
                    interface.internal_name
                );
            }
        }
        out.push('\n');
    }

    let _ = write!(
        out,
        "    // Register the component with the Log Daemon.\n\
         \x20   {comp}_LogSession = log_RegComponent(\"{comp}\", &{comp}_LogLevelFilterPtr);\n\
         \n\
         // Queue the default component's COMPONENT_INIT_ONCE to Event Loop.\n\
         \x20   event_QueueComponentInit({init}_ONCE);\n\
         \n\
         \x20   //Queue the COMPONENT_INIT function to be called by the event loop\n\
         \x20   event_QueueComponentInit({init});\n\
         }}\n\
         \n\
         \n\
         #ifdef __cplusplus\n\
         }}\n\
         #endif\n",
        comp = comp_name,
        init = component.init_func_name
    );

    system::write_file(&file_path, out)
}
