pub mod deployment;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;

pub use deployment::{Deployment, DeploymentError};
