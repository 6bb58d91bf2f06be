//! Points ledger orchestration.
//!
//! [`Ledger`] runs the ledger's use cases (registration, transfers, balance
//! and history reads, grants) over any [`points_store::Store`]. Each use case
//! is a single unit of work: either every write lands or none does.
//!
//! # Example
//!
//! ```no_run
//! use points_core::BonusRules;
//! use points_engine::{Ledger, RegisterUser, TransferPoints, DEFAULT_TX_TIMEOUT};
//! use points_store::MemoryStore;
//!
//! # async fn example() -> points_engine::Result<()> {
//! let ledger = Ledger::new(MemoryStore::new(), BonusRules::default(), DEFAULT_TX_TIMEOUT);
//!
//! let alice = ledger.register_user(RegisterUser::new("Alice", "alice@example.com", None)?).await?;
//! let bob = ledger
//!     .register_user(RegisterUser::new(
//!         "Bob",
//!         "bob@example.com",
//!         Some(alice.user.referral_code.clone()),
//!     )?)
//!     .await?;
//!
//! ledger.grant_points(bob.user.id, 500).await?;
//! ledger
//!     .transfer_points(TransferPoints::new(bob.user.id, alice.user.id, 250)?)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bonus;
pub mod commands;
pub mod error;
pub mod ledger;

pub use bonus::BonusOutcome;
pub use commands::{RegisterUser, TransferPoints};
pub use error::{ErrorKind, LedgerError, Result};
pub use ledger::{
    Ledger, Registration, TransferReceipt, DEFAULT_TX_TIMEOUT, MAX_REFERRAL_CODE_ATTEMPTS,
};
