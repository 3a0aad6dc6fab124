//! Persisted shapes of the two backend services.
//! - `sample_data`: the single relational table and its data access helpers.
//! - `blob`: object metadata and the durable object naming convention.

pub mod blob;
pub mod errors;
pub mod sample_data;
