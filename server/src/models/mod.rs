pub mod deployment;
pub mod user;

pub use deployment::{Deployment, Service, ServiceRecord};
pub use user::User;
