//! Command implementations for the pare CLI

pub mod delete;
pub mod deploy;
pub mod invoke;
pub mod status;

pub use self::delete::DeleteArgs;
pub use self::deploy::DeployArgs;
pub use self::invoke::InvokeArgs;
