//! shgate - path-addressable shell scripts over HTTP
//!
//! Scripts are fetched with `curl -fsSL https://host/<path>.sh | sh`. A script
//! may be locked behind a password; the server then answers with a prompt
//! script that trades the password for a short-lived token and re-fetches.
//!
//! ## Components
//!
//! - **paths**: script and folder path validation
//! - **negotiate**: CLI vs browser classification
//! - **auth**: password hashing, the lock gate and token handling
//! - **folders**: ancestor folder synthesis on the write path
//! - **catalog**: flat catalog and hierarchical tree projections
//! - **services**: admin write/read paths with audit logging
//! - **db**: storage trait with SQLite and in-memory backends

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod folders;
pub mod negotiate;
pub mod paths;
pub mod routes;
pub mod server;
pub mod services;
pub mod templates;
pub mod types;

pub use config::Args;
pub use server::{dispatch, run, AppState};
pub use types::{GateError, Result};
