//! The system model: root of everything an .sdef describes

use std::collections::BTreeMap;

use serde::Serialize;

use crate::system::{path, Location};

use super::app::App;
use super::binding::Binding;
use super::module::Module;

/// A non-app user account that takes part in IPC bindings.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub name: String,

    /// Outgoing bindings, keyed by client interface name.
    pub bindings: BTreeMap<String, Binding>,
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bindings: BTreeMap::new(),
        }
    }
}

/// A shell command exposed by an app in the system's `commands:` section.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub name: String,
    pub app_name: String,
    /// Absolute path of the executable inside the app's read-only area.
    pub exe_path: String,
    pub location: Location,
}

/// A whole system of applications, users, commands and kernel modules.
#[derive(Debug, Clone, Serialize)]
pub struct System {
    pub name: String,
    pub def_file_path: String,

    pub apps: BTreeMap<String, App>,
    pub users: BTreeMap<String, User>,
    pub commands: BTreeMap<String, Command>,
    pub modules: BTreeMap<String, Module>,
}

impl System {
    pub fn new(sdef_path: &str) -> Self {
        Self {
            name: path::get_identifier_safe_name(&path::remove_suffix(
                &path::get_last_node(sdef_path),
                ".sdef",
            )),
            def_file_path: sdef_path.to_string(),
            apps: BTreeMap::new(),
            users: BTreeMap::new(),
            commands: BTreeMap::new(),
            modules: BTreeMap::new(),
        }
    }
}
