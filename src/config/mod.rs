// src/config/mod.rs

//! Configuration for the executor.
//!
//! - Agent identity and protocol endpoints come from the environment the
//!   agent launches us with (`env.rs`).
//! - Timing and collaborator settings come from an optional TOML file
//!   (`model.rs`, `loader.rs`, `validate.rs`).

pub mod env;
pub mod loader;
pub mod model;
pub mod validate;

pub use env::{AgentIdentity, parse_duration};
pub use loader::{load_from_path, load_settings};
pub use model::{RawSettings, ResubscribePolicy, Settings};
