//! Server configuration types.
//!
//! This module defines the server-level configuration:
//! - Address and port bindings
//! - Scope embedded in retrieval URLs
//! - Upload size limit
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ADDRESS, DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_PORT, DEFAULT_SCOPE};

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_max_upload_size() -> usize {
    DEFAULT_MAX_UPLOAD_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Model identifier used in the retrieval URLs handed back on upload
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Public host name used in retrieval URLs (defaults to the request's Host header)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_host: Option<String>,
    /// Maximum accepted upload size in bytes (default: 512 MB)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            scope: default_scope(),
            public_host: None,
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
