//! Kernel modules

use std::collections::BTreeMap;

use serde::Serialize;

use crate::system::{path, Location};

/// Where a module's binary comes from: built from kernel sources or shipped
/// pre-built.  A .mdef supplies exactly one of the two.
#[derive(Debug, Clone, Serialize)]
pub enum ModuleBuild {
    Sources {
        /// C source files, each paired with the object file it builds to.
        c_sources: Vec<ObjectFile>,
        /// Kernel source directory the module is built against.
        kernel_dir: String,
    },
    Prebuilt {
        /// Paths of the .ko files to install.
        ko_files: Vec<String>,
    },
}

/// A source file and the object file it compiles to.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectFile {
    pub source_file_path: String,
    pub object_file_path: String,
}

/// A kernel module, as described by a .mdef.
#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub name: String,
    pub dir: String,
    pub def_file_path: String,

    pub build: ModuleBuild,

    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,

    /// insmod parameters, keyed by parameter name.
    pub params: BTreeMap<String, String>,

    pub location: Location,
}

impl Module {
    pub fn new(mdef_path: &str, build: ModuleBuild, location: Location) -> Self {
        Self {
            name: path::remove_suffix(&path::get_last_node(mdef_path), ".mdef"),
            dir: path::make_canonical(&path::get_containing_dir(mdef_path)),
            def_file_path: mdef_path.to_string(),
            build,
            cflags: Vec::new(),
            ldflags: Vec::new(),
            params: BTreeMap::new(),
            location,
        }
    }
}
