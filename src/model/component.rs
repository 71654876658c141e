//! Software components

use std::collections::BTreeSet;

use serde::Serialize;

use crate::system::{path, Location};

use super::api::{ApiClientInterface, ApiServerInterface, ApiTypesOnlyInterface};
use super::{ApiFileId, ComponentId, FileSystemObject};

/// A component, as described by the Component.cdef in its directory.
///
/// Interned by canonical directory: one instance per directory for the
/// whole run.  Immutable once modelled.
#[derive(Debug, Clone, Serialize)]
pub struct Component {
    /// Canonical path of the directory the component lives in.
    pub dir: String,

    /// Component name (the directory's last path node).
    pub name: String,

    /// Build working directory for this component, relative to the build's
    /// root working directory.
    pub working_dir: String,

    pub c_sources: Vec<String>,
    pub cxx_sources: Vec<String>,
    pub java_sources: Vec<String>,
    pub python_sources: Vec<String>,

    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,

    pub bundled_files: Vec<FileSystemObject>,
    pub bundled_dirs: Vec<FileSystemObject>,
    pub required_files: Vec<FileSystemObject>,
    pub required_dirs: Vec<FileSystemObject>,
    pub required_devices: Vec<FileSystemObject>,

    /// Components this one requires, in declaration order.
    pub sub_components: Vec<ComponentId>,

    pub types_only_apis: Vec<ApiTypesOnlyInterface>,
    pub client_apis: Vec<ApiClientInterface>,
    pub server_apis: Vec<ApiServerInterface>,

    /// Transitive closures of USETYPES includes reachable from the client
    /// and server interfaces.
    pub client_usetypes_apis: BTreeSet<ApiFileId>,
    pub server_usetypes_apis: BTreeSet<ApiFileId>,

    pub assets: Vec<Asset>,

    /// Path to the component library that will be built, or "" when the
    /// component has no compiled code.
    pub lib: String,

    /// Name of the component's COMPONENT_INIT function, or "" when the
    /// component has no compiled code.
    pub init_func_name: String,

    /// Built outside any executable (mkcomp); interface instance names are
    /// fully resolved instead of supplied by a generated _main.c.
    pub is_standalone: bool,

    pub location: Location,
}

impl Component {
    pub fn new(cdef_path: &str, location: Location) -> Self {
        let dir = path::make_canonical(&path::get_containing_dir(cdef_path));
        let name = path::get_last_node(&dir);
        let working_dir = path::combine("component", &name);
        Self {
            dir,
            name,
            working_dir,
            c_sources: Vec::new(),
            cxx_sources: Vec::new(),
            java_sources: Vec::new(),
            python_sources: Vec::new(),
            cflags: Vec::new(),
            cxxflags: Vec::new(),
            ldflags: Vec::new(),
            bundled_files: Vec::new(),
            bundled_dirs: Vec::new(),
            required_files: Vec::new(),
            required_dirs: Vec::new(),
            required_devices: Vec::new(),
            sub_components: Vec::new(),
            types_only_apis: Vec::new(),
            client_apis: Vec::new(),
            server_apis: Vec::new(),
            client_usetypes_apis: BTreeSet::new(),
            server_usetypes_apis: BTreeSet::new(),
            assets: Vec::new(),
            lib: String::new(),
            init_func_name: String::new(),
            is_standalone: false,
            location,
        }
    }

    pub fn has_c_or_cpp_code(&self) -> bool {
        !self.c_sources.is_empty() || !self.cxx_sources.is_empty()
    }

    pub fn has_java_code(&self) -> bool {
        !self.java_sources.is_empty()
    }

    pub fn has_python_code(&self) -> bool {
        !self.python_sources.is_empty()
    }

    pub fn has_code(&self) -> bool {
        self.has_c_or_cpp_code() || self.has_java_code() || self.has_python_code()
    }
}

/// What an asset field is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetFieldKind {
    Setting,
    Variable,
    Command,
}

impl AssetFieldKind {
    /// Access string used in the generated configuration.
    pub fn access_str(self) -> &'static str {
        match self {
            AssetFieldKind::Setting => "r",
            AssetFieldKind::Variable => "rw",
            AssetFieldKind::Command => "x",
        }
    }
}

/// One field of an AirVantage asset.
#[derive(Debug, Clone, Serialize)]
pub struct AssetField {
    pub kind: AssetFieldKind,
    /// "bool", "int", "float" or "string"; empty for commands.
    pub data_type: String,
    pub name: String,
    pub default_value: Option<String>,
}

/// An AirVantage asset declared in a .cdef `assets:` section.
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub name: String,
    pub fields: Vec<AssetField>,
}
