//! # Vulcano Compliance
//!
//! Client for a remote compliance server: lists hosted profiles, serves
//! their source to the runner and accepts run summaries.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vulcano_compliance::{ComplianceClient, ComplianceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ComplianceConfig::new("https://compliance.example.com")
//!         .with_token("secret");
//!     let client = ComplianceClient::new(config)?;
//!
//!     for profile in client.profiles().await? {
//!         println!("{}", profile.reference());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The runner consumes remote profiles through [`BlockingFetcher`], which
//! implements [`vulcano_core::ProfileFetcher`].

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod client;
mod config;
mod error;
mod fetcher;

pub use client::{ComplianceClient, ServerProfile};
pub use config::{ComplianceConfig, StoredConfig, DEFAULT_API_PATH, HOME_ENV};
pub use error::{ComplianceError, Result};
pub use fetcher::BlockingFetcher;
