//! Service builds: container images and zip packages

pub mod adapter;
pub mod image;
pub mod package;
pub mod runner;
