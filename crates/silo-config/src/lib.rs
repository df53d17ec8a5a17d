#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Static configuration for the silo toolkit: a TOML file plus environment
//! variable overrides, resolved once at process start.

mod error;
mod loader;
mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    load, DEFAULT_CONFIG_FILE, ENV_CATALOG_PATH, ENV_CLIENT_PASSWORD, ENV_CLIENT_URL,
    ENV_CLIENT_USERNAME,
};
pub use model::{ClientConfig, RawClientConfig, RawConfig, SiloConfig};
