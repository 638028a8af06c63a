//! Persistent storage for the client application.
//!
//! Currently only the TOML configuration file lives here.

pub mod config;
