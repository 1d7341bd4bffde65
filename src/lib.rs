//! metagodoc indexer
//!
//! Discovers public Go repositories on a hosting platform, mirrors them into a local cache,
//! classifies their activity, enumerates their packages per ref, and publishes one document
//! per repository into a search index that a separate read-only API serves.
//!
//! # Module Organization
//!
//! - [`crawl`]: crawl sources and the scheduler that runs them
//! - [`repository`]: turning one remote repository into a [`repository::RepositorySnapshot`]
//! - [`hosting`]: hosting-platform API client
//! - [`index`]: search index access and the snapshot writer
//! - [`config`]: configuration file handling
//! - [`cache`]: the on-disk cache root

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod cache;
pub mod config;
pub mod crawl;
pub mod hosting;
pub mod index;
pub mod repository;
