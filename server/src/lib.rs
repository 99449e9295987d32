//! Pare deploy server library
//!
//! Builds Python services from an uploaded bundle, publishes each as a
//! serverless function and records the deployment.

pub mod app;
pub mod build;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod function;
pub mod logs;
pub mod models;
pub mod packaging;
pub mod registry;
pub mod server;
pub mod storage;
pub mod utils;
