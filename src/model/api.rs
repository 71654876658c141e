//! IPC API files and interfaces

use std::collections::BTreeMap;

use serde::Serialize;

use crate::system::path;

use super::ApiFileId;

/// A .api interface-description file.
///
/// Interned: exactly one instance exists per canonical path for a whole run
/// (see [super::Model::get_or_create_api_file]).
#[derive(Debug, Clone, Serialize)]
pub struct ApiFile {
    /// Canonical path to the file.
    pub path: String,

    /// Interface name used when no alias is given: the file name minus
    /// the .api suffix.
    pub default_prefix: String,

    /// true if some other .api file pulls this one in with USETYPES.
    pub is_included: bool,

    /// Directory that generated IPC code for this file goes into, relative
    /// to the working directory.  Derived from the path digest so distinct
    /// .api files never collide.
    pub code_gen_dir: String,

    /// .api files this one pulls types from.
    pub includes: Vec<ApiFileId>,

    /// Memory pool sizes overridden from the .sdef, keyed by pool name.
    pub pool_sizes: BTreeMap<String, u64>,
}

impl ApiFile {
    pub fn new(canonical_path: &str) -> Self {
        let default_prefix = path::remove_suffix(&path::get_last_node(canonical_path), ".api");
        let digest = format!("{:x}", md5::compute(canonical_path.as_bytes()));
        Self {
            path: canonical_path.to_string(),
            default_prefix,
            is_included: false,
            code_gen_dir: path::combine("api", &digest),
            includes: Vec::new(),
            pool_sizes: BTreeMap::new(),
        }
    }

    /// Path of the client-side .h generated for this .api under a given
    /// internal alias.
    pub fn client_interface_file(&self, internal_name: &str) -> String {
        format!(
            "{}/{}_interface.h",
            path::combine(&self.code_gen_dir, "client"),
            internal_name
        )
    }

    /// Path of the synchronous server-side .h generated for this .api.
    pub fn server_interface_file(&self, internal_name: &str) -> String {
        format!(
            "{}/{}_server.h",
            path::combine(&self.code_gen_dir, "server"),
            internal_name
        )
    }

    /// Path of the async server-side .h generated for this .api.
    pub fn async_server_interface_file(&self, internal_name: &str) -> String {
        format!(
            "{}/{}_server.h",
            path::combine(&self.code_gen_dir, "async_server"),
            internal_name
        )
    }

    pub fn client_source_file(&self, internal_name: &str) -> String {
        format!(
            "{}/{}_client.c",
            path::combine(&self.code_gen_dir, "client"),
            internal_name
        )
    }

    pub fn server_source_file(&self, internal_name: &str, async_: bool) -> String {
        let subdir = if async_ { "async_server" } else { "server" };
        format!(
            "{}/{}_server.c",
            path::combine(&self.code_gen_dir, subdir),
            internal_name
        )
    }
}

/// A component's use of a .api purely for its data types.
#[derive(Debug, Clone, Serialize)]
pub struct ApiTypesOnlyInterface {
    pub api_file: ApiFileId,
    pub internal_name: String,
}

/// A component's client-side use of a .api.
#[derive(Debug, Clone, Serialize)]
pub struct ApiClientInterface {
    pub api_file: ApiFileId,
    pub internal_name: String,
    pub manual_start: bool,
    pub optional: bool,
}

/// A component's server-side implementation of a .api.
#[derive(Debug, Clone, Serialize)]
pub struct ApiServerInterface {
    pub api_file: ApiFileId,
    pub internal_name: String,
    /// Generate the asynchronous server-side interface code.
    pub is_async: bool,
    pub manual_start: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_and_codegen_dir() {
        let api = ApiFile::new("/legato/interfaces/le_cfg.api");
        assert_eq!(api.default_prefix, "le_cfg");
        assert!(api.code_gen_dir.starts_with("api/"));
        // 32 hex digits after the "api/" prefix.
        assert_eq!(api.code_gen_dir.len(), "api/".len() + 32);
    }

    #[test]
    fn interface_file_paths_use_alias() {
        let api = ApiFile::new("/x/le_gpio.api");
        let header = api.client_interface_file("pin7");
        assert!(header.ends_with("client/pin7_interface.h"), "{}", header);
        let server = api.async_server_interface_file("svc");
        assert!(server.contains("async_server"), "{}", server);
    }
}
