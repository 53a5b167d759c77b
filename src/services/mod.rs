//! Services layer
//!
//! Business logic behind the admin API. Route handlers stay thin and
//! delegate here; everything storage-related goes through `ScriptStore`.

pub mod scripts;

pub use scripts::{FolderInput, ScriptInput, ScriptService, ScriptView};
