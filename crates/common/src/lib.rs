//! Pieces shared by the gateway and both backend services.

pub mod admin_http;
pub mod env;
pub mod lazy_resource;
pub mod types;
pub mod utils;

pub use lazy_resource::{InitError, LazyResource, ResourceFactory, ResourceState};
