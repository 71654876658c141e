//! IPC bindings

use serde::Serialize;

use crate::system::Location;

/// What kind of agent one end of a binding names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgentType {
    /// An exe inside the same app.
    Internal,
    /// Another app.
    ExternalApp,
    /// A non-app user account.
    ExternalUser,
}

/// A directed edge from a client interface to a server interface.
#[derive(Debug, Clone, Serialize)]
pub struct Binding {
    pub client_type: AgentType,
    pub client_agent: String,
    pub client_if: String,

    pub server_type: AgentType,
    pub server_agent: String,
    pub server_if: String,

    pub location: Location,
}
