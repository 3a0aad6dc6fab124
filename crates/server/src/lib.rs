//! HTTP surface of the two backend processes (API-1 relational, API-2 object storage).

pub mod errors;
pub mod routes;
pub mod startup;

pub use startup::{run_relational, run_storage};
