//! State-transition core for a decentralized storage market.
//!
//! Two sub-ledgers share one caller-identity and height model:
//!
//! * [`registry`] — storage providers (capacity, price) and the files stored
//!   on them. Capacity leaves a provider on store and returns on delete.
//! * [`token`] — the fungible payment token. The sum of all balances always
//!   equals the total supply.
//!
//! [`StorageLedger`] composes both and is the single entry point: every call
//! carries an explicit [`CallContext`], is validated in full before anything
//! is written, and either applies completely or returns a [`LedgerError`]
//! with the ledger untouched. Transport, persistence and signature checks
//! belong to the embedding process.

pub mod config;
pub mod ledger;
pub mod registry;
pub mod token;
pub mod types;

mod error;

pub use config::{ConfigError, LedgerConfig, PaymentPolicy};
pub use error::{LedgerError, Result};
pub use ledger::{Call, CallOutput, InvariantViolation, LedgerEvent, LedgerSnapshot, StorageLedger};
pub use registry::{FileInfo, ProviderInfo};
pub use types::{AccountId, Amount, CallContext, FileId, Height};
