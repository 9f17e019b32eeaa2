//! Tenant AuthZ Server
//!
//! Envoy `ext_authz` (v3, gRPC) front end for the tenant credential store.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tenant_authz_server::{AuthzServer, ServerConfig};
//!
//! let server = AuthzServer::bootstrap(ServerConfig::default())?;
//! server.serve(shutdown).await?;
//! ```

pub mod config;
pub mod reload;
pub mod server;
pub mod service;

pub use config::{Args, ServerConfig};
pub use reload::Reloader;
pub use server::AuthzServer;
pub use service::{to_check_response, ExtAuthzService};

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("authorization setup failed: {0}")]
    Authz(#[from] tenant_authz::AuthzError),

    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
