//! Service configuration
//!
//! [`ServiceConfig`] is assembled from [`ServiceArgs`], which clap fills from
//! command-line flags and environment variables (a `.env` file is loaded
//! first by the binary).

pub mod args;
pub mod getters;
pub mod methods;
pub mod types;

pub use args::ServiceArgs;
pub use types::ServiceConfig;
