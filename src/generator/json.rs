//! JSON model dump
//!
//! A machine-readable snapshot of the conceptual model, mostly consumed by
//! IDE integrations and by tests.

use serde_json::json;

use crate::buildparams::BuildParams;
use crate::model::{App, Exe, Model, System};
use crate::system::{self, path, Error};

fn write_dump(value: serde_json::Value, build_params: &BuildParams) -> Result<(), Error> {
    system::ensure_directory(&build_params.working_dir)?;
    let file_path = path::combine(&build_params.working_dir, "model.json");
    if build_params.be_verbose {
        system::verboseln!("Generating", "model dump '{}'.", file_path);
    }
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| Error::Validate(format!("Cannot serialize model: {}", e)))?;
    system::write_file(&file_path, text)
}

pub fn generate_system_dump(
    model: &Model,
    sys: &System,
    build_params: &BuildParams,
) -> Result<(), Error> {
    write_dump(
        json!({
            "target": build_params.target,
            "interned": model,
            "system": sys,
        }),
        build_params,
    )
}

pub fn generate_app_dump(
    model: &Model,
    app: &App,
    build_params: &BuildParams,
) -> Result<(), Error> {
    write_dump(
        json!({
            "target": build_params.target,
            "interned": model,
            "app": app,
        }),
        build_params,
    )
}

pub fn generate_exe_dump(
    model: &Model,
    exe: &Exe,
    build_params: &BuildParams,
) -> Result<(), Error> {
    write_dump(
        json!({
            "target": build_params.target,
            "interned": model,
            "exe": exe,
        }),
        build_params,
    )
}
