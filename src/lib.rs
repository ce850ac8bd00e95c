//! Label printing library
//!
//! Resolves a unit's serial number on a production line to its model, reads
//! the model's label field values from the line database, writes them to the
//! label template's CSV data source and has BarTender print the template.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod errors;
pub mod migrator;
pub mod models;
pub mod queries;
pub mod services;

pub use errors::ServiceError;
