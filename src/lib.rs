//! confkv - typed key/value configuration store.
//!
//! - [`store`] - value model, validation, the repository contract, and the
//!   SQLite, PostgreSQL, and remote backends
//! - [`server`] - HTTP API that exposes a store (and that the remote backend talks to)
//! - [`config`] - TOML settings for the server and CLI
//! - [`paths`] - platform paths for the embedded database

pub mod config;
pub mod paths;
pub mod server;
pub mod store;
