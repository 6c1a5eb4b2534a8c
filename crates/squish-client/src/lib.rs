//! Squish Client SDK.
//!
//! This crate provides a client library for frontend widgets and sibling
//! services to poll usage statistics and drive operations against the squish
//! API.
//!
//! # Example
//!
//! ```no_run
//! use squish_client::SquishClient;
//!
//! # async fn example() -> Result<(), squish_client::ClientError> {
//! let client = SquishClient::new("http://squish.internal:8080")?
//!     .with_session("3f0b9a4e-8a6e-4a7e-b0a3-1c2d3e4f5a6b");
//!
//! // Poll the usage indicator
//! let stats = client.usage_stats(Some("premium")).await?;
//! println!(
//!     "{} of {} operations used",
//!     stats.operations.used, stats.operations.limit
//! );
//!
//! // Pre-flight a conversion
//! let check = client.check_operation("photo.nef", 24_000_000, None).await?;
//! if !check.allowed {
//!     println!("blocked: {}", check.reason.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::SquishClient;
pub use error::ClientError;
pub use types::*;
