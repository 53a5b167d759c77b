//! Locked-script authentication
//!
//! A locked script is served only to callers presenting a gating token bound
//! to that script. Tokens are minted by [`LockGate::verify_password`] and
//! expire five minutes after issue.

pub mod gate;
pub mod password;
pub mod token;

pub use gate::{token_grants, Access, IssuedToken, LockGate, TOKEN_TTL_SECS};
pub use password::{hash_password, verify_password};
pub use token::{extract_token, spawn_token_sweep_task};
