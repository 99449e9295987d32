//! Pare CLI
//!
//! Services are registered explicitly in a manifest, bundled together with
//! their source files and uploaded to the deploy API.

pub mod bundle;
pub mod client;
pub mod commands;
pub mod console;
pub mod errors;
pub mod git;
pub mod manifest;
pub mod settings;
