//! Applications, process environments and processes

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::system::{self, path, Error, Location};

use super::binding::Binding;
use super::exe::{ApiClientInterfaceInstance, ApiServerInterfaceInstance, Exe};
use super::limit::{FaultAction, Limit, WatchdogAction, WatchdogTimeout};
use super::priority::Priority;
use super::{ApiFileId, ComponentId, Permissions};

/// Maximum length of a process name, in bytes.
pub const MAX_PROCESS_NAME_LEN: usize = 47;

/// How the supervisor starts the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StartTrigger {
    #[default]
    Auto,
    Manual,
}

/// Addresses one client interface instance inside an app:
/// `executables[exe].component_instances[instance].client_apis[interface]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientIfRef {
    pub exe: String,
    pub instance: usize,
    pub interface: usize,
}

/// Same, for a server interface instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerIfRef {
    pub exe: String,
    pub instance: usize,
    pub interface: usize,
}

/// A client or server interface declared on the app that the build did not
/// produce itself (a pre-built binary advertises or consumes it).
#[derive(Debug, Clone, Serialize)]
pub struct PreBuiltInterface {
    pub api_file: ApiFileId,
    pub name: String,
    pub binding: Option<Binding>,
}

/// One process listed in a `run:` subsection.
#[derive(Debug, Clone, Serialize)]
pub struct Process {
    name: String,
    pub exe_path: String,
    pub args: Vec<String>,
    pub location: Location,
}

impl Process {
    pub fn new(location: Location) -> Self {
        Self {
            name: String::new(),
            exe_path: String::new(),
            args: Vec::new(),
            location,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), Error> {
        if name.len() > MAX_PROCESS_NAME_LEN {
            return Err(Error::Model(
                self.location.clone(),
                format!(
                    "Process name '{}' is too long.  Must be a maximum of {} bytes.",
                    name, MAX_PROCESS_NAME_LEN
                ),
            ));
        }
        if name.is_empty() {
            return Err(Error::Model(self.location.clone(), "Empty process name.".to_string()));
        }
        self.name = name.to_string();
        Ok(())
    }
}

/// A group of processes sharing fault handling, priorities, resource
/// ceilings, a watchdog and environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessEnv {
    pub fault_action: Option<FaultAction>,

    start_priority: Priority,
    max_priority: Priority,

    pub max_file_bytes: Limit<u64>,
    pub max_core_dump_file_bytes: Limit<u64>,
    pub max_locked_memory_bytes: Limit<u64>,
    pub max_file_descriptors: Limit<u64>,

    pub watchdog_timeout: Option<WatchdogTimeout>,
    pub watchdog_action: Option<WatchdogAction>,

    pub env_vars: BTreeMap<String, String>,
    pub processes: Vec<Process>,
}

impl Default for ProcessEnv {
    fn default() -> Self {
        Self {
            fault_action: None,
            start_priority: Priority::default(),
            max_priority: Priority::default(),
            max_file_bytes: Limit::new(100 * 1024),
            max_core_dump_file_bytes: Limit::new(100 * 1024),
            max_locked_memory_bytes: Limit::new(8 * 1024),
            max_file_descriptors: Limit::new(256),
            watchdog_timeout: None,
            watchdog_action: None,
            env_vars: BTreeMap::new(),
            processes: Vec::new(),
        }
    }
}

impl ProcessEnv {
    pub fn start_priority(&self) -> &Priority {
        &self.start_priority
    }

    pub fn max_priority(&self) -> &Priority {
        &self.max_priority
    }

    /// Set the starting priority, clamping it to the maximum priority (with
    /// a warning, never silently).
    pub fn set_start_priority(&mut self, priority: Priority) {
        self.start_priority = priority;
        self.clamp_start_priority();
    }

    /// Set the maximum priority; an already-set start priority above it is
    /// clamped down.
    pub fn set_max_priority(&mut self, priority: Priority) {
        self.max_priority = priority;
        self.clamp_start_priority();
    }

    fn clamp_start_priority(&mut self) {
        if self.start_priority.is_higher_than(&self.max_priority) {
            system::warnln!(
                "Warning",
                "clamping start priority level '{}' to maximum priority level '{}'.",
                self.start_priority.get(),
                self.max_priority.get()
            );
            self.start_priority = self.max_priority.clone();
        }
    }

    pub fn are_real_time_threads_permitted(&self) -> bool {
        self.max_priority.is_real_time() || self.start_priority.is_real_time()
    }
}

/// An application.
#[derive(Debug, Clone, Serialize)]
pub struct App {
    pub name: String,

    /// Canonical directory containing the .adef.
    pub dir: String,

    /// Path of the .adef this app was modelled from.
    pub def_file_path: String,

    /// Build working directory, relative to the build root ("app/<name>").
    pub working_dir: String,

    pub version: String,
    pub is_sandboxed: bool,
    pub start_trigger: StartTrigger,
    pub is_preloaded: bool,

    /// Union of the components used by the app's executables (plus any
    /// listed in a `components:` section).
    pub components: BTreeSet<ComponentId>,

    pub executables: BTreeMap<String, Exe>,

    pub bundled_files: Vec<super::FileSystemObject>,
    pub bundled_dirs: Vec<super::FileSystemObject>,
    pub required_files: Vec<super::FileSystemObject>,
    pub required_dirs: Vec<super::FileSystemObject>,
    pub required_devices: Vec<super::FileSystemObject>,

    pub groups: BTreeSet<String>,

    /// Access permissions for configuration trees, keyed by tree name.
    /// Keys are unique; `.` in the .adef names the app's own tree.
    pub config_trees: BTreeMap<String, Permissions>,

    pub process_envs: Vec<ProcessEnv>,

    pub cpu_share: Limit<u64>,
    pub max_file_system_bytes: Limit<u64>,
    pub max_memory_bytes: Limit<u64>,
    pub max_mqueue_bytes: Limit<u64>,
    pub max_queued_signals: Limit<u64>,
    pub max_threads: Limit<u64>,
    pub max_secure_storage_bytes: Limit<u64>,

    pub watchdog_timeout: Option<WatchdogTimeout>,
    pub watchdog_action: Option<WatchdogAction>,

    /// Interfaces exported for system-level binding, keyed by external name.
    /// The two maps share a namespace; duplicates are fatal.
    pub extern_client_interfaces: BTreeMap<String, ClientIfRef>,
    pub extern_server_interfaces: BTreeMap<String, ServerIfRef>,

    pub pre_built_client_interfaces: BTreeMap<String, PreBuiltInterface>,
    pub pre_built_server_interfaces: BTreeMap<String, PreBuiltInterface>,

    /// Wildcard (`*.name`) bindings for pre-built binaries, keyed by client
    /// interface name.
    pub wildcard_bindings: BTreeMap<String, Binding>,

    /// Memory pool size overrides from the .sdef, keyed by pool name.
    pub pools: BTreeMap<String, u64>,

    pub location: Location,
}

impl App {
    pub fn new(adef_path: &str, location: Location) -> Self {
        let name = path::get_identifier_safe_name(&path::remove_suffix(
            &path::get_last_node(adef_path),
            ".adef",
        ));
        Self {
            working_dir: path::combine("app", &name),
            name,
            dir: path::make_canonical(&path::get_containing_dir(adef_path)),
            def_file_path: adef_path.to_string(),
            version: String::new(),
            is_sandboxed: true,
            start_trigger: StartTrigger::Auto,
            is_preloaded: false,
            components: BTreeSet::new(),
            executables: BTreeMap::new(),
            bundled_files: Vec::new(),
            bundled_dirs: Vec::new(),
            required_files: Vec::new(),
            required_dirs: Vec::new(),
            required_devices: Vec::new(),
            groups: BTreeSet::new(),
            config_trees: BTreeMap::new(),
            process_envs: Vec::new(),
            cpu_share: Limit::new(1024),
            max_file_system_bytes: Limit::new(128 * 1024),
            max_memory_bytes: Limit::new(40000 * 1024),
            max_mqueue_bytes: Limit::new(512),
            max_queued_signals: Limit::new(100),
            max_threads: Limit::new(20),
            max_secure_storage_bytes: Limit::new(8192),
            watchdog_timeout: None,
            watchdog_action: None,
            extern_client_interfaces: BTreeMap::new(),
            extern_server_interfaces: BTreeMap::new(),
            pre_built_client_interfaces: BTreeMap::new(),
            pre_built_server_interfaces: BTreeMap::new(),
            wildcard_bindings: BTreeMap::new(),
            pools: BTreeMap::new(),
            location,
        }
    }

    /// Path of the app's root.cfg relative to the build's working dir.
    pub fn config_file_path(&self) -> String {
        path::combine(&self.working_dir, "staging/root.cfg")
    }

    pub fn client_interface(&self, if_ref: &ClientIfRef) -> &ApiClientInterfaceInstance {
        &self.executables[&if_ref.exe].component_instances[if_ref.instance].client_apis
            [if_ref.interface]
    }

    pub fn client_interface_mut(&mut self, if_ref: &ClientIfRef) -> &mut ApiClientInterfaceInstance {
        self.executables
            .get_mut(&if_ref.exe)
            .expect("client interface ref points at a modelled exe")
            .component_instances[if_ref.instance]
            .client_apis
            .get_mut(if_ref.interface)
            .expect("client interface ref points at a modelled interface")
    }

    pub fn server_interface(&self, if_ref: &ServerIfRef) -> &ApiServerInterfaceInstance {
        &self.executables[&if_ref.exe].component_instances[if_ref.instance].server_apis
            [if_ref.interface]
    }

    pub fn server_interface_mut(&mut self, if_ref: &ServerIfRef) -> &mut ApiServerInterfaceInstance {
        self.executables
            .get_mut(&if_ref.exe)
            .expect("server interface ref points at a modelled exe")
            .component_instances[if_ref.instance]
            .server_apis
            .get_mut(if_ref.interface)
            .expect("server interface ref points at a modelled interface")
    }

    /// All bindings of the app, in deterministic order: instance bindings
    /// in executable order, then pre-built and wildcard bindings.
    pub fn bindings(&self) -> Vec<&Binding> {
        let mut result: Vec<&Binding> = Vec::new();
        for exe in self.executables.values() {
            for instance in &exe.component_instances {
                for client in &instance.client_apis {
                    if let Some(binding) = &client.binding {
                        result.push(binding);
                    }
                }
            }
        }
        for pre_built in self.pre_built_client_interfaces.values() {
            if let Some(binding) = &pre_built.binding {
                result.push(binding);
            }
        }
        result.extend(self.wildcard_bindings.values());
        result
    }
}
