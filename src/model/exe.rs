//! Executables and component instances

use serde::Serialize;

use crate::system::{path, Location};

use super::binding::Binding;
use super::ComponentId;

/// One component placed into one executable.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInstance {
    pub component: ComponentId,
    pub client_apis: Vec<ApiClientInterfaceInstance>,
    pub server_apis: Vec<ApiServerInterfaceInstance>,
}

/// Per-instance state of a client-side interface.
#[derive(Debug, Clone, Serialize)]
pub struct ApiClientInterfaceInstance {
    /// Index into the component's `client_apis`.
    pub api_index: usize,

    /// Fully-qualified name `exe.component.alias`, replaced by the external
    /// name when the interface is exported.
    pub name: String,

    /// Exported for system-level binding.
    pub is_external: bool,

    /// Where the `extern:` entry marked it, for duplicate diagnostics.
    pub extern_mark: Option<Location>,

    pub binding: Option<Binding>,
}

/// Per-instance state of a server-side interface.
#[derive(Debug, Clone, Serialize)]
pub struct ApiServerInterfaceInstance {
    /// Index into the component's `server_apis`.
    pub api_index: usize,

    pub name: String,
    pub is_external: bool,
    pub extern_mark: Option<Location>,
}

/// An executable to build: an ordered set of component instances.
///
/// `component_instances` is topologically sorted, leaves first, so each
/// component precedes everything that requires it and initialization can
/// run front to back.
#[derive(Debug, Clone, Serialize)]
pub struct Exe {
    pub name: String,

    /// Path of the built executable relative to the app's working dir (or
    /// an output path for free-standing mkexe builds).
    pub path: String,

    pub component_instances: Vec<ComponentInstance>,

    pub has_c_or_cpp_code: bool,
    pub has_java_code: bool,
    pub has_python_code: bool,

    pub location: Location,
}

impl Exe {
    pub fn new(exe_path: &str, location: Location) -> Self {
        Self {
            name: path::get_last_node(&path::remove_suffix(exe_path, ".jar")),
            path: exe_path.to_string(),
            component_instances: Vec::new(),
            has_c_or_cpp_code: false,
            has_java_code: false,
            has_python_code: false,
            location,
        }
    }

    /// Exe name derived from a process's executable path.
    pub fn name_from_path(exe_path: &str) -> String {
        path::get_last_node(exe_path)
    }

    /// Source path of the generated main file for this exe, relative to the
    /// working directory.
    pub fn main_source_file(&self) -> String {
        let dir = path::combine("exe", &self.name);
        if self.has_java_code {
            path::combine(&dir, "src/io/legato/generated/exe/Main.java")
        } else if self.has_python_code {
            path::combine(&dir, "src/main.py")
        } else {
            path::combine(&dir, "src/_main.c")
        }
    }

    /// Object path the generated main file compiles to.
    pub fn main_object_file(&self) -> String {
        format!("{}.o", self.main_source_file())
    }

    /// Name of the exe's "default" component, which owns source files given
    /// directly on the executables: line.
    pub fn default_component_name(&self) -> String {
        format!("{}_exe", self.name)
    }
}
