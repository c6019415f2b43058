//! Key server client and archive unpacking for keywatch.
//!
//! This crate provides the network side of the detection pipeline:
//!
//! - [`url::archive_url`] - Resolves index entries against the archive host
//! - [`parse_index`] - Parses the newline-separated archive index
//! - [`KeyServerClient`] - HTTP client with connection pooling and optional retries
//! - [`ZipUnpacker`] - Extracts key material from downloaded archives

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keywatch/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod index;
mod unpack;
pub mod url;

pub use client::{ClientConfig, KeyServerClient};
pub use index::parse_index;
pub use unpack::{KEY_EXPORT_ENTRY, SIGNATURE_ENTRY, ZipUnpacker, unpack_package};
