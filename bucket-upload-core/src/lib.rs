#![doc = "bucket-upload-core: core logic library for bucket-upload."]

//! This crate contains the storage-agnostic logic of bucket-upload: selecting
//! files with include/exclude globs and streaming them to an object store.
//! Concrete storage clients live in the binary crate and plug in through the
//! traits in [`contract`].
//!
//! # Usage
//! Build an [`config::UploadConfig`], pick a [`contract::GlobEvaluator`]
//! (normally [`glob::FsGlob`]) and a [`contract::StorageSession`], then call
//! [`upload::upload_all`].

pub mod config;
pub mod contract;
pub mod error;
pub mod glob;
pub mod resolve;
pub mod upload;

pub use error::{Error, GlobError};
