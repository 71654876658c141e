//! Build parameters shared by the modeller and the generators

use crate::envvars;
use crate::system::path;

/// Which compiler family the generated linker scripts must suit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompilerFamily {
    #[default]
    Gcc,
    ArmRvct,
}

/// Which family of back-end generators to run for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFamily {
    Linux,
    Rtos,
}

/// Everything the pipeline needs to know about one invocation.  Generators
/// receive this read-only; they never mutate the model either.
#[derive(Debug, Clone, Default)]
pub struct BuildParams {
    pub be_verbose: bool,

    /// Target device name (e.g. "localhost" or "wp85").
    pub target: String,

    /// Root of the build working directory.
    pub working_dir: String,

    /// Where component libraries get built to.
    pub lib_output_dir: String,

    /// Directories to search for source files, .adef files and components.
    pub source_dirs: Vec<String>,

    /// Directories to search for .api files.
    pub interface_dirs: Vec<String>,

    pub compiler_family: CompilerFamily,

    /// Generate code and config only; skip the ninja script.
    pub code_gen_only: bool,
}

impl BuildParams {
    pub fn new() -> Self {
        let framework_root = envvars::get("LEGATO_ROOT");

        let mut interface_dirs = Vec::new();
        if !framework_root.is_empty() {
            interface_dirs.push(path::combine(&framework_root, "interfaces"));
            interface_dirs.push(path::combine(&framework_root, "framework/c/inc"));
        }

        Self {
            target: "localhost".to_string(),
            interface_dirs,
            ..Default::default()
        }
    }

    pub fn target_family(&self) -> TargetFamily {
        match self.target.as_str() {
            "rtos" | "freertos" | "threadx" => TargetFamily::Rtos,
            _ => TargetFamily::Linux,
        }
    }

    /// true when cross-building for an embedded device.
    pub fn is_cross_build(&self) -> bool {
        self.target != "localhost"
    }
}
