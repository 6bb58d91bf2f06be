//! Points Ledger Client SDK.
//!
//! This crate provides a client library for services to interact with the
//! points ledger API.
//!
//! # Example
//!
//! ```no_run
//! use points_client::PointsClient;
//!
//! # async fn example() -> Result<(), points_client::ClientError> {
//! let client = PointsClient::new("http://points.ledger.svc:8080")?;
//!
//! let alice = client.register("Alice", "alice@example.com", None).await?;
//! let bob = client
//!     .register("Bob", "bob@example.com", Some(&alice.user.referral_code))
//!     .await?;
//!
//! let sender = bob.user.id.parse().expect("server returns valid ids");
//! let recipient = alice.user.id.parse().expect("server returns valid ids");
//! let response = client.transfer(sender, recipient, 25).await?;
//!
//! println!("Bob now has {} points", response.balance);
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

pub use client::{ClientOptions, PointsClient};
pub use error::ClientError;
pub use types::*;
