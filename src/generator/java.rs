//! Java component and exe code generation

use std::fmt::Write as _;

use crate::buildparams::BuildParams;
use crate::model::{Component, Exe, Model};
use crate::system::{self, path, Error};

/// Generate the io.legato.generated.component.<name>.Factory class for a
/// Java component.
pub fn generate_component_main(
    _model: &Model,
    component: &Component,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let comp_name = &component.name;

    let output_dir = path::minimize(&format!(
        "{}/{}/src/io/legato/generated/component/{}",
        build_params.working_dir, component.working_dir, comp_name
    ));
    let file_path = path::combine(&output_dir, "Factory.java");

    if build_params.be_verbose {
        system::verboseln!(
            "Generating",
            "component-specific IPC code for component '{}' in '{}'.",
            comp_name,
            file_path
        );
    }
    system::ensure_directory(&output_dir)?;

    let mut api_imports = String::new();
    let mut server_vars = String::new();
    let mut instance_names = String::new();
    let mut server_inits = String::new();
    let mut client_inits = String::new();

    for server_api in &component.server_apis {
        let class_name = format!("{}Server", server_api.internal_name);
        let var_name = format!("instance{}", server_api.internal_name);

        let _ = writeln!(
            api_imports,
            "import io.legato.api.implementation.{}Server;",
            server_api.internal_name
        );
        let _ = writeln!(server_vars, "    public static {} {};", class_name, var_name);
        let _ = writeln!(
            instance_names,
            "    public static String {}ServiceInstanceName;",
            server_api.internal_name
        );
        let _ = writeln!(
            server_inits,
            "        {} = new {}(component);",
            var_name, class_name
        );
        if !server_api.manual_start {
            let _ = writeln!(
                server_inits,
                "        {}.open({}ServiceInstanceName);",
                var_name, server_api.internal_name
            );
        }
    }

    for client_api in &component.client_apis {
        let class_name = format!("{}Client", client_api.internal_name);
        let var_name = format!("instance{}", client_api.internal_name);

        let _ = writeln!(
            api_imports,
            "import io.legato.api.implementation.{};\nimport io.legato.api.{};",
            class_name, client_api.internal_name
        );
        let _ = writeln!(
            client_inits,
            "        {} {} = new {}();",
            class_name, var_name, class_name
        );
        let _ = writeln!(
            instance_names,
            "    public static String {}ServiceInstanceName;",
            client_api.internal_name
        );
        if !client_api.manual_start {
            let _ = writeln!(
                client_inits,
                "        {}.open({}ServiceInstanceName);",
                var_name, client_api.internal_name
            );
        }
        let _ = writeln!(
            client_inits,
            "        component.registerService({}.class, {});",
            client_api.internal_name, var_name
        );
    }

    let mut out = String::new();
    let _ = write!(
        out,
        "// AUTO-GENERATED component Factory for the {comp} component.\n\
         // Don't bother hand-editing this file.\n\
         package io.legato.generated.component.{comp};\n\
         \n\
         import io.legato.Component;\n\
         import io.legato.Runtime;\n\
         {imports}\n\
         public class Factory\n\
         {{\n\
         {server_vars}\
         {instance_names}\
         \n\
         \x20   public static void initComponent({comp} component)\n\
         \x20   {{\n\
         {server_inits}\
         {client_inits}\
         \x20       Runtime.scheduleComponentInit(component);\n\
         \x20   }}\n\
         }}\n",
        comp = comp_name,
        imports = api_imports,
        server_vars = server_vars,
        instance_names = instance_names,
        server_inits = server_inits,
        client_inits = client_inits
    );

    system::write_file(&file_path, out)
}

/// Generate the launcher Main.java for a Java executable.
pub fn generate_exe_main(model: &Model, exe: &Exe, build_params: &BuildParams) -> Result<(), Error> {
    let source_file = path::combine(&build_params.working_dir, &exe.main_source_file());

    if build_params.be_verbose {
        system::verboseln!(
            "Generating",
            "startup code for executable '{}' in '{}'.",
            exe.name,
            source_file
        );
    }
    system::ensure_directory(path::get_containing_dir(&source_file))?;

    let mut out = String::new();
    let _ = write!(
        out,
        "// AUTO-GENERATED launcher for the '{}' executable.\n\
         // Don't bother hand-editing this file.\n\
         package io.legato.generated.exe;\n\
         \n\
         import io.legato.Runtime;\n\
         \n\
         public class Main\n\
         {{\n\
         \x20   public static void main(String[] args)\n\
         \x20   {{\n",
        exe.name
    );

    // Resolve every interface instance name, then spin up each component
    // through its Factory.
    for instance in &exe.component_instances {
        let component = model.component(instance.component);
        if !component.has_java_code() {
            continue;
        }
        let factory = format!("io.legato.generated.component.{}.Factory", component.name);
        for if_instance in &instance.server_apis {
            let internal_name = &component.server_apis[if_instance.api_index].internal_name;
            let _ = writeln!(
                out,
                "        {}.{}ServiceInstanceName = \"{}\";",
                factory, internal_name, if_instance.name
            );
        }
        for if_instance in &instance.client_apis {
            let internal_name = &component.client_apis[if_instance.api_index].internal_name;
            let _ = writeln!(
                out,
                "        {}.{}ServiceInstanceName = \"{}\";",
                factory, internal_name, if_instance.name
            );
        }
        let _ = writeln!(
            out,
            "        {}.initComponent(new io.legato.components.{}());",
            factory, component.name
        );
    }

    out.push_str(
        "        Runtime.runEventLoop();\n\
         \x20   }\n\
         }\n",
    );

    system::write_file(&source_file, out)
}
