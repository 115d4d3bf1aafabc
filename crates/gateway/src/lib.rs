//! Delivery gateway for handing submissions to JDownloader
//!
//! This crate defines the `DeliveryGateway` seam, the live client that talks
//! to the JDownloader local HTTP API, and the connectivity monitor that caches
//! whether the downloader is reachable.

pub mod client;
pub mod health;
pub mod traits;

pub use client::*;
pub use health::*;
pub use traits::*;
