// src/lib.rs

//! Catalog Admin - async orchestration for an e-commerce catalog back office

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::result_large_err)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod types;

// Re-export commonly used types
pub use catalog::{CatalogApi, MessageSurface, RetryFetcher, SubmissionOrchestrator};
pub use error::{Error, ErrorKind, Result, ResultExt};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
