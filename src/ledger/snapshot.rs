use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::StorageLedger;
use crate::registry::{StorageProvider, StoredFile};
use crate::types::{AccountId, Amount, FileId, Height};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub height: Height,
    pub providers: BTreeMap<AccountId, StorageProvider>,
    pub files: BTreeMap<FileId, StoredFile>,
    pub balances: BTreeMap<AccountId, Amount>,
    pub total_supply: Amount,
    pub token_uri: String,
    pub event_count: usize,
    pub state_root: [u8; 32],
}

impl LedgerSnapshot {
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("provider {provider} has {available} free and {allocated} allocated, registered capacity {capacity}")]
    CapacityNotConserved {
        provider: AccountId,
        available: u64,
        allocated: u64,
        capacity: u64,
    },
    #[error("provider {provider} records {recorded} allocated units, live files hold {live}")]
    CapacityMismatch {
        provider: AccountId,
        recorded: u64,
        live: u128,
    },
    #[error("file {file_id} references unknown provider {provider}")]
    DanglingFile { file_id: FileId, provider: AccountId },
    #[error("balances sum to {sum}, total supply is {total_supply}")]
    SupplyMismatch { sum: u128, total_supply: Amount },
}

impl StorageLedger {
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            height: self.height,
            providers: self.registry.providers().clone(),
            files: self.registry.files().clone(),
            balances: self.token.balances().clone(),
            total_supply: self.token.total_supply(),
            token_uri: self.token.token_uri().to_string(),
            event_count: self.events.len(),
            state_root: self.state_root(),
        }
    }

    /// Merkle root over providers, files, balances and token scalars.
    pub fn state_root(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::new();
        for (id, provider) in self.registry.providers() {
            let mut hasher = Sha256::new();
            hasher.update(b"provider");
            hash_str(&mut hasher, id);
            hasher.update(provider.available_space.to_le_bytes());
            hasher.update(provider.allocated_space.to_le_bytes());
            hasher.update(provider.price_per_block.to_le_bytes());
            hasher.update(provider.capacity.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        for (id, file) in self.registry.files() {
            let mut hasher = Sha256::new();
            hasher.update(b"file");
            hash_str(&mut hasher, id);
            hash_str(&mut hasher, &file.owner);
            hasher.update(file.size.to_le_bytes());
            hash_str(&mut hasher, &file.storage_provider);
            hash_str(&mut hasher, &file.encrypted_location);
            hasher.update(file.last_payment_height.to_le_bytes());
            hasher.update(file.stored_at_height.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        for (account, balance) in self.token.balances() {
            let mut hasher = Sha256::new();
            hasher.update(b"acct");
            hash_str(&mut hasher, account);
            hasher.update(balance.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        let mut hasher = Sha256::new();
        hasher.update(b"token");
        hasher.update(self.token.total_supply().to_le_bytes());
        hash_str(&mut hasher, self.token.token_uri());
        leaves.push(hasher.finalize().into());
        build_merkle(leaves)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut live: BTreeMap<&AccountId, u128> = BTreeMap::new();
        for (file_id, file) in self.registry.files() {
            if self.registry.provider(&file.storage_provider).is_none() {
                return Err(InvariantViolation::DanglingFile {
                    file_id: file_id.clone(),
                    provider: file.storage_provider.clone(),
                });
            }
            *live.entry(&file.storage_provider).or_insert(0) += u128::from(file.size);
        }
        for (id, provider) in self.registry.providers() {
            let pooled = u128::from(provider.available_space) + u128::from(provider.allocated_space);
            if pooled != u128::from(provider.capacity) {
                return Err(InvariantViolation::CapacityNotConserved {
                    provider: id.clone(),
                    available: provider.available_space,
                    allocated: provider.allocated_space,
                    capacity: provider.capacity,
                });
            }
            let held = live.get(id).copied().unwrap_or(0);
            if u128::from(provider.allocated_space) != held {
                return Err(InvariantViolation::CapacityMismatch {
                    provider: id.clone(),
                    recorded: provider.allocated_space,
                    live: held,
                });
            }
        }
        let sum: u128 = self
            .token
            .balances()
            .values()
            .map(|b| u128::from(*b))
            .sum();
        if sum != u128::from(self.token.total_supply()) {
            return Err(InvariantViolation::SupplyMismatch {
                sum,
                total_supply: self.token.total_supply(),
            });
        }
        Ok(())
    }
}

// Length prefix keeps adjacent identifiers from running together.
fn hash_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"storage-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
