//! Service layer of the two backend processes.
//! - `relational`: key/value rows in the `sample_data` table behind a lazily connected pool.
//! - `blob_container` / `blob_service`: blobs in one container behind a lazily built client.
//!
//! Both acquire their external handle through `common::LazyResource`, so the
//! first request (or the startup warm-up) connects and every later request reuses it.

pub mod azure_admin;
pub mod blob_container;
pub mod blob_service;
pub mod errors;
pub mod relational;
