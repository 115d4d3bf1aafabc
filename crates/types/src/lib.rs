//! Shared types for the JD bridge
//!
//! This crate contains the domain types shared by the bridge components:
//! buffered submissions, intake and replay outcomes, the JDownloader wire
//! format, and the error taxonomy.

pub mod buffer;
pub mod error;
pub mod jd;
pub mod submission;
pub mod utils;

// Re-export commonly used types
pub use buffer::*;
pub use error::{BridgeError, ConfigError, DatabaseError, ErrorKind, GatewayError, GatewayResult, Result};
pub use jd::{AddContainerRequest, AddLinksRequest, ContainerType, JdErrorResponse};
pub use submission::*;
