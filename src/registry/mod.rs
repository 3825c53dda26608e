use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{LedgerError, Result};
use crate::types::{AccountId, Amount, FileId, Height};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageProvider {
    pub available_space: u64,
    pub price_per_block: Amount,
    /// Space held by live files.
    pub allocated_space: u64,
    /// Capacity given at registration; always
    /// `available_space + allocated_space`.
    pub capacity: u64,
}

impl StorageProvider {
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            available_space: self.available_space,
            price_per_block: self.price_per_block,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    pub owner: AccountId,
    pub size: u64,
    pub storage_provider: AccountId,
    pub encrypted_location: String,
    pub last_payment_height: Height,
    pub stored_at_height: Height,
}

impl StoredFile {
    pub fn info(&self) -> FileInfo {
        FileInfo {
            owner: self.owner.clone(),
            size: self.size,
            storage_provider: self.storage_provider.clone(),
            encrypted_location: self.encrypted_location.clone(),
            last_payment_height: self.last_payment_height,
        }
    }

    /// Height billing resumes from: the last payment, or the store height for
    /// files that were never paid for.
    pub fn billed_through(&self) -> Height {
        self.last_payment_height.max(self.stored_at_height)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderInfo {
    pub available_space: u64,
    pub price_per_block: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileInfo {
    pub owner: AccountId,
    pub size: u64,
    pub storage_provider: AccountId,
    pub encrypted_location: String,
    pub last_payment_height: Height,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registry {
    providers: BTreeMap<AccountId, StorageProvider>,
    files: BTreeMap<FileId, StoredFile>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn providers(&self) -> &BTreeMap<AccountId, StorageProvider> {
        &self.providers
    }

    pub fn files(&self) -> &BTreeMap<FileId, StoredFile> {
        &self.files
    }

    pub fn provider(&self, provider: &AccountId) -> Option<&StorageProvider> {
        self.providers.get(provider)
    }

    pub fn file(&self, file_id: &FileId) -> Option<&StoredFile> {
        self.files.get(file_id)
    }

    /// Creates or replaces `provider`'s record.
    ///
    /// Space already held by live files stays allocated: the new available
    /// space is `capacity` minus that allocation, and shrinking below it fails.
    pub fn register_provider(
        &mut self,
        provider: &AccountId,
        capacity: u64,
        price_per_block: Amount,
    ) -> Result<()> {
        let allocated = self
            .providers
            .get(provider)
            .map(|p| p.allocated_space)
            .unwrap_or(0);
        let available_space =
            capacity
                .checked_sub(allocated)
                .ok_or_else(|| LedgerError::CapacityBelowAllocated {
                    provider: provider.clone(),
                    capacity,
                    allocated,
                })?;
        self.providers.insert(
            provider.clone(),
            StorageProvider {
                available_space,
                price_per_block,
                allocated_space: allocated,
                capacity,
            },
        );
        trace!(%provider, capacity, price_per_block, allocated, "provider registered");
        Ok(())
    }

    pub fn store_file(
        &mut self,
        owner: &AccountId,
        file_id: &FileId,
        size: u64,
        provider: &AccountId,
        encrypted_location: &str,
        height: Height,
    ) -> Result<()> {
        if size == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let record = self
            .providers
            .get_mut(provider)
            .ok_or_else(|| LedgerError::ProviderNotFound {
                provider: provider.clone(),
            })?;
        if size > record.available_space {
            return Err(LedgerError::InsufficientCapacity {
                provider: provider.clone(),
                requested: size,
                available: record.available_space,
            });
        }
        if self.files.contains_key(file_id) {
            return Err(LedgerError::FileIdInUse {
                file_id: file_id.clone(),
            });
        }
        let allocated_space = record
            .allocated_space
            .checked_add(size)
            .ok_or(LedgerError::Overflow("provider allocation"))?;

        record.available_space -= size;
        record.allocated_space = allocated_space;
        self.files.insert(
            file_id.clone(),
            StoredFile {
                owner: owner.clone(),
                size,
                storage_provider: provider.clone(),
                encrypted_location: encrypted_location.to_string(),
                last_payment_height: 0,
                stored_at_height: height,
            },
        );
        trace!(%file_id, %owner, %provider, size, "file stored");
        Ok(())
    }

    pub fn owned_file(&self, caller: &AccountId, file_id: &FileId) -> Result<&StoredFile> {
        let file = self
            .files
            .get(file_id)
            .ok_or_else(|| LedgerError::FileNotFound {
                file_id: file_id.clone(),
            })?;
        if &file.owner != caller {
            return Err(LedgerError::NotFileOwner {
                caller: caller.clone(),
                file_id: file_id.clone(),
            });
        }
        Ok(file)
    }

    pub fn retrieve_file(&self, caller: &AccountId, file_id: &FileId) -> Result<&str> {
        self.owned_file(caller, file_id)
            .map(|file| file.encrypted_location.as_str())
    }

    /// Removes the file and returns its space to the provider.
    pub fn delete_file(&mut self, caller: &AccountId, file_id: &FileId) -> Result<StoredFile> {
        let file = self.owned_file(caller, file_id)?;
        let size = file.size;
        let provider_id = file.storage_provider.clone();
        let record =
            self.providers
                .get_mut(&provider_id)
                .ok_or_else(|| LedgerError::ProviderNotFound {
                    provider: provider_id.clone(),
                })?;
        let available_space = record
            .available_space
            .checked_add(size)
            .ok_or(LedgerError::Overflow("provider available space"))?;

        record.available_space = available_space;
        record.allocated_space = record.allocated_space.saturating_sub(size);
        let removed = self
            .files
            .remove(file_id)
            .ok_or_else(|| LedgerError::FileNotFound {
                file_id: file_id.clone(),
            })?;
        trace!(%file_id, provider = %provider_id, size, "file deleted");
        Ok(removed)
    }

    #[cfg(test)]
    pub(crate) fn provider_mut(&mut self, provider: &AccountId) -> Option<&mut StorageProvider> {
        self.providers.get_mut(provider)
    }

    pub fn stamp_payment(&mut self, file_id: &FileId, height: Height) -> Result<()> {
        let file = self
            .files
            .get_mut(file_id)
            .ok_or_else(|| LedgerError::FileNotFound {
                file_id: file_id.clone(),
            })?;
        file.last_payment_height = height;
        Ok(())
    }

    pub fn file_info(&self, file_id: &FileId) -> Result<FileInfo> {
        self.files
            .get(file_id)
            .map(StoredFile::info)
            .ok_or_else(|| LedgerError::FileNotFound {
                file_id: file_id.clone(),
            })
    }

    pub fn provider_info(&self, provider: &AccountId) -> Result<ProviderInfo> {
        self.providers
            .get(provider)
            .map(StorageProvider::info)
            .ok_or_else(|| LedgerError::ProviderNotFound {
                provider: provider.clone(),
            })
    }
}
