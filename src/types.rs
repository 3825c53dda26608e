use serde::{Deserialize, Serialize};

pub type AccountId = String;
pub type FileId = String;
pub type Amount = u64;
pub type Height = u64;

/// Caller identity and height supplied by the execution environment.
///
/// The identity is assumed to be authenticated already.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallContext {
    pub caller: AccountId,
    pub height: Height,
}

impl CallContext {
    pub fn new(caller: impl Into<AccountId>, height: Height) -> Self {
        Self {
            caller: caller.into(),
            height,
        }
    }
}
