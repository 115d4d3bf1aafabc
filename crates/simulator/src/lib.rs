//! Simulated downloader
//!
//! This crate provides a deterministic in-process stand-in for JDownloader,
//! used for development without a running downloader and throughout the
//! bridge test suite.

pub mod engine;

pub use engine::*;
