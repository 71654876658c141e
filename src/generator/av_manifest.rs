//! AirVantage manifest generation

use std::fmt::Write as _;

use crate::buildparams::BuildParams;
use crate::model::App;
use crate::system::{self, path, Error};

/// Generate the one-page AirVantage manifest XML for an app, written to
/// `manifest.app` under the working directory.
pub fn generate(app: &App, build_params: &BuildParams) -> Result<(), Error> {
    let file_path = path::combine(&build_params.working_dir, "manifest.app");

    let version = if app.version.is_empty() {
        "unknown"
    } else {
        &app.version
    };

    if build_params.be_verbose {
        system::verboseln!("Generating", "Air Vantage manifest: {}", file_path);
    }

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<app:application \
         xmlns:app=\"http://www.sierrawireless.com/airvantage/application/1.0\" \
         name=\"{}\" type=\"\" revision=\"{}\">",
        app.name, version
    );
    out.push_str("  <application-manager use=\"LWM2M_SW\"/>\n");
    out.push_str("</app:application>\n");

    system::ensure_directory(&build_params.working_dir)?;
    system::write_file(&file_path, out)
}
