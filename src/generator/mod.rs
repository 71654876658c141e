//! Artifact generators
//!
//! Generators consume a fully-validated model plus the build parameters and
//! write files under the working directory.  They never mutate the model,
//! and anything driven by a map iterates in key order so outputs are
//! byte-reproducible.

pub mod adef_export;
pub mod av_manifest;
pub mod component_main;
pub mod config;
pub mod exe_main;
pub mod interfaces_header;
pub mod java;
pub mod json;
pub mod ninja;
pub mod python;
pub mod rtos;

use crate::buildparams::{BuildParams, TargetFamily};
use crate::model::{App, Component, Exe, Model, System};
use crate::system::Error;

/// Generate the per-component files (interfaces.h plus the language-matched
/// component main).
pub fn generate_component(
    model: &Model,
    component: &Component,
    build_params: &BuildParams,
) -> Result<(), Error> {
    if component.has_c_or_cpp_code() {
        interfaces_header::generate(model, component, build_params)?;
        component_main::generate(model, component, build_params)?;
    }
    if component.has_java_code() {
        java::generate_component_main(model, component, build_params)?;
    }
    Ok(())
}

/// Generate the per-exe startup file in the exe's implementation language.
pub fn generate_exe(model: &Model, exe: &Exe, build_params: &BuildParams) -> Result<(), Error> {
    if exe.has_java_code {
        java::generate_exe_main(model, exe, build_params)
    } else if exe.has_python_code {
        python::generate_exe_main(model, exe, build_params)
    } else {
        exe_main::generate(model, exe, build_params)
    }
}

/// Generate everything for one application (the mkapp artifact set).
pub fn generate_app(model: &Model, app: &App, build_params: &BuildParams) -> Result<(), Error> {
    for &component_id in &app.components {
        generate_component(model, model.component(component_id), build_params)?;
    }
    for exe in app.executables.values() {
        generate_exe(model, exe, build_params)?;
    }

    config::generate(model, app, build_params)?;
    av_manifest::generate(app, build_params)?;
    adef_export::generate(model, app, build_params)?;
    Ok(())
}

/// Generate everything for a whole system (the mksys artifact set), with
/// the back-end set picked by the target family.
pub fn generate_system(
    model: &Model,
    sys: &System,
    build_params: &BuildParams,
) -> Result<(), Error> {
    for app in sys.apps.values() {
        generate_app(model, app, build_params)?;
    }

    if build_params.target_family() == TargetFamily::Rtos {
        rtos::generate_system_tasks(model, sys, build_params)?;
        rtos::generate_linker_script(model, sys, build_params)?;
    }

    if !build_params.code_gen_only {
        ninja::generate_for_system(model, sys, build_params)?;
    }

    json::generate_system_dump(model, sys, build_params)?;
    Ok(())
}
