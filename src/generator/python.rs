//! Python exe launcher generation

use std::fmt::Write as _;

use crate::buildparams::BuildParams;
use crate::model::{Exe, Model};
use crate::system::{self, path, Error};

/// Generate the launcher main.py for a Python executable.
pub fn generate_exe_main(model: &Model, exe: &Exe, build_params: &BuildParams) -> Result<(), Error> {
    let launcher_file = path::combine(&build_params.working_dir, &exe.main_source_file());

    if build_params.be_verbose {
        system::verboseln!(
            "Generating",
            "startup code for executable '{}' in '{}'.",
            exe.name,
            launcher_file
        );
    }
    system::ensure_directory(path::get_containing_dir(&launcher_file))?;

    let mut out = String::new();
    out.push_str(
        "#!/usr/bin/env python\n\
         import sys\n\
         import os\n\
         root = sys.path[0]\n\
         sys.path.insert(1, os.path.join(root,'../lib'))\n\
         sys.path.insert(1, '/legato/systems/current/lib/python2.7/site-packages')\n\
         import liblegato\n\
         argv_keepalive = [liblegato.ffi.new('char[]', arg) for arg in sys.argv]\n\
         argv = liblegato.ffi.new('char *[]', argv_keepalive)\n\
         liblegato.le_arg_SetArgs(len(sys.argv), argv)\n",
    );

    for instance in &exe.component_instances {
        let component = model.component(instance.component);
        if !component.has_python_code() {
            continue;
        }

        for if_instance in &instance.client_apis {
            let client_api = &component.client_apis[if_instance.api_index];
            let api_name = &client_api.internal_name;

            let _ = writeln!(out, "import {}", api_name);
            let _ = writeln!(
                out,
                "{}.set_ServiceInstanceName('{}')",
                api_name, if_instance.name
            );
            // Connect before any package code runs, unless suppressed.
            if !client_api.manual_start && !client_api.optional {
                let _ = writeln!(out, "{}.ConnectService()", api_name);
            }
        }

        // Path insertion removes the need for __init__.py in every
        // component directory.
        let _ = writeln!(out, "sys.path.insert(1, os.path.join(root, '{}'))", component.name);
        for source in &component.python_sources {
            let import_name = path::remove_suffix(&path::get_last_node(source), ".py");
            let _ = writeln!(out, "import {}", import_name);
        }
    }

    out.push_str("liblegato.le_event_RunLoop()\n");

    system::write_file(&launcher_file, out)
}
