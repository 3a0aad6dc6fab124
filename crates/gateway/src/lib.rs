pub mod config;
pub mod observability;
pub mod proxy;
pub mod bootstrap;

pub use bootstrap::{build_router, run};
