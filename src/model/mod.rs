//! The conceptual model
//!
//! Passive data lowered from parse trees.  Entities that may be referenced
//! from many places (.api files, components) live in arenas on [Model] and
//! are addressed through copyable id handles; everything else is owned by
//! exactly one parent (system -> apps -> executables -> instances).

pub mod api;
pub mod app;
pub mod binding;
pub mod component;
pub mod exe;
pub mod limit;
pub mod module;
pub mod priority;
pub mod system;

pub use api::{ApiClientInterface, ApiFile, ApiServerInterface, ApiTypesOnlyInterface};
pub use app::{App, ClientIfRef, PreBuiltInterface, Process, ProcessEnv, ServerIfRef, StartTrigger};
pub use binding::{AgentType, Binding};
pub use component::{Asset, AssetField, AssetFieldKind, Component};
pub use exe::{ApiClientInterfaceInstance, ApiServerInterfaceInstance, ComponentInstance, Exe};
pub use limit::{FaultAction, Limit, WatchdogAction, WatchdogTimeout};
pub use module::{Module, ModuleBuild, ObjectFile};
pub use priority::Priority;
pub use system::{Command, System, User};

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::system::{path, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ApiFileId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentId(pub u32);

/// rwx permissions on a file system object or config tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub readable: bool,
    pub writeable: bool,
    pub executable: bool,
}

impl Permissions {
    pub fn read_only() -> Self {
        Self {
            readable: true,
            ..Default::default()
        }
    }
}

/// A file, directory or device mapping with source, destination and
/// permissions.
#[derive(Debug, Clone, Serialize)]
pub struct FileSystemObject {
    pub src_path: String,
    pub dest_path: String,
    pub permissions: Permissions,
}

/// The interning context.
///
/// Holds the arenas for the two entity kinds that are deduplicated across
/// the whole run: one [ApiFile] per canonical .api path and one [Component]
/// per canonical component directory.  Populated during modelling,
/// read-only afterwards.
#[derive(Debug, Default, Serialize)]
pub struct Model {
    pub api_files: Vec<ApiFile>,
    pub components: Vec<Component>,

    #[serde(skip)]
    api_by_path: FxHashMap<String, ApiFileId>,
    #[serde(skip)]
    component_by_dir: FxHashMap<String, ComponentId>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_file(&self, id: ApiFileId) -> &ApiFile {
        &self.api_files[id.0 as usize]
    }

    pub fn api_file_mut(&mut self, id: ApiFileId) -> &mut ApiFile {
        &mut self.api_files[id.0 as usize]
    }

    /// Look up the interned .api file object for a path, if one exists.
    pub fn get_api_file(&self, api_file_path: &str) -> Option<ApiFileId> {
        self.api_by_path
            .get(&path::make_canonical(api_file_path))
            .copied()
    }

    /// Create the interned .api file object for a path.
    ///
    /// Fails if one already exists for the same canonical path; callers are
    /// expected to check with [Self::get_api_file] first.
    pub fn create_api_file(&mut self, api_file_path: &str) -> Result<ApiFileId, Error> {
        let canonical = path::make_canonical(api_file_path);
        if self.api_by_path.contains_key(&canonical) {
            return Err(Error::Validate(format!(
                "Internal error: Attempt to create duplicate API File object for '{}' ({}).",
                canonical, api_file_path
            )));
        }
        let id = ApiFileId(self.api_files.len() as u32);
        self.api_files.push(ApiFile::new(&canonical));
        self.api_by_path.insert(canonical, id);
        Ok(id)
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.0 as usize]
    }

    pub fn component_mut(&mut self, id: ComponentId) -> &mut Component {
        &mut self.components[id.0 as usize]
    }

    /// Look up the interned component for a directory, if already modelled.
    pub fn get_component(&self, component_dir: &str) -> Option<ComponentId> {
        self.component_by_dir
            .get(&path::make_canonical(component_dir))
            .copied()
    }

    /// Register a freshly modelled component under its canonical directory.
    pub fn add_component(&mut self, component: Component) -> Result<ComponentId, Error> {
        if self.component_by_dir.contains_key(&component.dir) {
            return Err(Error::Validate(format!(
                "Internal error: Attempt to create duplicate component object for '{}'.",
                component.dir
            )));
        }
        let id = ComponentId(self.components.len() as u32);
        self.component_by_dir.insert(component.dir.clone(), id);
        self.components.push(component);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::Location;

    #[test]
    fn api_files_are_interned_by_canonical_path() {
        let mut model = Model::new();
        let id = model.create_api_file("/a/b/../b/le_cfg.api").unwrap();
        assert_eq!(model.get_api_file("/a/b/le_cfg.api"), Some(id));
        assert!(model.create_api_file("/a/b/le_cfg.api").is_err());
        assert_eq!(model.api_file(id).default_prefix, "le_cfg");
    }

    #[test]
    fn components_are_interned_by_dir() {
        let mut model = Model::new();
        let location = Location::new("/proj/comp/Component.cdef", 1, 0);
        let comp = Component::new("/proj/comp/Component.cdef", location);
        let id = model.add_component(comp).unwrap();
        assert_eq!(model.get_component("/proj/comp"), Some(id));
        assert_eq!(model.get_component("/proj/./comp/"), Some(id));
        assert_eq!(model.component(id).name, "comp");
    }
}
