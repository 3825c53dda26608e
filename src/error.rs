use thiserror::Error;

use crate::types::{AccountId, Amount, FileId, Height};

/// Failure kinds returned by every ledger operation.
///
/// A returned error always means the call left the ledger untouched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller is not the contract owner (mint, token URI updates).
    #[error("operation restricted to the contract owner, caller {caller}")]
    OwnerOnly { caller: AccountId },

    #[error("caller {caller} cannot move funds of {from}")]
    NotTokenOwner { caller: AccountId, from: AccountId },

    #[error("caller {caller} does not own file {file_id}")]
    NotFileOwner { caller: AccountId, file_id: FileId },

    #[error("file {file_id} not found")]
    FileNotFound { file_id: FileId },

    #[error("storage provider {provider} not found")]
    ProviderNotFound { provider: AccountId },

    #[error("provider {provider} has {available} units free, {requested} requested")]
    InsufficientCapacity {
        provider: AccountId,
        requested: u64,
        available: u64,
    },

    #[error("file id {file_id} is already in use")]
    FileIdInUse { file_id: FileId },

    /// Plain token transfer exceeding the sender's balance.
    #[error("transfer of {amount} from {from} failed: balance {balance}")]
    TransferFailed {
        from: AccountId,
        amount: Amount,
        balance: Amount,
    },

    #[error("amount must be positive")]
    InvalidAmount,

    /// Settlement charge exceeding the file owner's balance.
    #[error("insufficient funds in account {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: AccountId,
        required: Amount,
        available: Amount,
    },

    #[error("payment for file {file_id} not due: {elapsed} of {interval} heights elapsed")]
    PaymentNotDue {
        file_id: FileId,
        elapsed: Height,
        interval: Height,
    },

    #[error("caller {caller} may not process payment for file {file_id}")]
    NotPaymentAgent { caller: AccountId, file_id: FileId },

    #[error("provider {provider} cannot shrink to {capacity}: {allocated} units allocated to live files")]
    CapacityBelowAllocated {
        provider: AccountId,
        capacity: u64,
        allocated: u64,
    },

    #[error("call at height {height} is older than ledger height {current}")]
    StaleHeight { height: Height, current: Height },

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl LedgerError {
    /// Stable numeric code surfaced to callers by the transport layer.
    ///
    /// Codes below 106 match the deployed storage and token contracts;
    /// `NotFileOwner` and `NotTokenOwner` share 101 because they come from
    /// separate contracts.
    pub fn code(&self) -> u32 {
        match self {
            LedgerError::TransferFailed { .. } => 1,
            LedgerError::OwnerOnly { .. } => 100,
            LedgerError::NotFileOwner { .. } => 101,
            LedgerError::NotTokenOwner { .. } => 101,
            LedgerError::FileNotFound { .. } => 102,
            LedgerError::InsufficientCapacity { .. } => 103,
            LedgerError::ProviderNotFound { .. } => 104,
            LedgerError::FileIdInUse { .. } => 105,
            LedgerError::InvalidAmount => 106,
            LedgerError::InsufficientFunds { .. } => 107,
            LedgerError::PaymentNotDue { .. } => 108,
            LedgerError::NotPaymentAgent { .. } => 109,
            LedgerError::CapacityBelowAllocated { .. } => 110,
            LedgerError::StaleHeight { .. } => 111,
            LedgerError::Overflow(_) => 112,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
