//! Per-component interfaces.h generation

use std::fmt::Write as _;

use crate::buildparams::BuildParams;
use crate::model::{Component, Model};
use crate::system::{self, path, Error};

/// Generate a component's interfaces.h, which pulls in one generated header
/// per API the component uses.
pub fn generate(
    model: &Model,
    component: &Component,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let output_dir = path::minimize(&format!(
        "{}/{}/src",
        build_params.working_dir, component.working_dir
    ));
    let file_path = path::combine(&output_dir, "interfaces.h");

    if build_params.be_verbose {
        system::verboseln!(
            "Generating",
            "interfaces.h for component '{}' in '{}'.",
            component.name,
            file_path
        );
    }

    system::ensure_directory(&output_dir)?;

    let include_guard = format!("__{}_COMPONENT_INTERFACE_H_INCLUDE_GUARD", component.name);

    let mut out = String::new();
    let _ = write!(
        out,
        "/*\n\
         * AUTO-GENERATED interface.h for the {} component.\n\
         \n\
         * Don't bother hand-editing this file.\n\
         */\n\
         \n\
         #ifndef {guard}\n\
         #define {guard}\n\
         \n\
         #ifdef __cplusplus\n\
         extern \"C\" {{\n\
         #endif\n\
         \n",
        component.name,
        guard = include_guard
    );

    // Types-only includes use the client-side header.
    for interface in &component.types_only_apis {
        let api = model.api_file(interface.api_file);
        let _ = writeln!(
            out,
            "#include \"{}\"",
            api.client_interface_file(&interface.internal_name)
        );
    }
    for interface in &component.client_apis {
        let api = model.api_file(interface.api_file);
        let _ = writeln!(
            out,
            "#include \"{}\"",
            api.client_interface_file(&interface.internal_name)
        );
    }
    for interface in &component.server_apis {
        let api = model.api_file(interface.api_file);
        let header = if interface.is_async {
            api.async_server_interface_file(&interface.internal_name)
        } else {
            api.server_interface_file(&interface.internal_name)
        };
        let _ = writeln!(out, "#include \"{}\"", header);
    }

    let _ = write!(
        out,
        "\n\
         #ifdef __cplusplus\n\
         }}\n\
         #endif\n\
         \n\
         #endif // {}\n",
        include_guard
    );

    system::write_file(&file_path, out)
}
