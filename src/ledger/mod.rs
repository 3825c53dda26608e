mod snapshot;

pub use snapshot::{InvariantViolation, LedgerSnapshot};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConfigError, LedgerConfig, PaymentPolicy};
use crate::error::{LedgerError, Result};
use crate::registry::{FileInfo, ProviderInfo, Registry};
use crate::token::TokenLedger;
use crate::types::{AccountId, Amount, CallContext, FileId, Height};

/// One external call, named after the contract function it reaches.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Call {
    RegisterStorageProvider {
        available_space: u64,
        price_per_block: Amount,
    },
    StoreFile {
        file_id: FileId,
        size: u64,
        provider: AccountId,
        encrypted_location: String,
    },
    RetrieveFile {
        file_id: FileId,
    },
    DeleteFile {
        file_id: FileId,
    },
    ProcessPayment {
        file_id: FileId,
    },
    GetFileInfo {
        file_id: FileId,
    },
    GetStorageProviderInfo {
        provider: AccountId,
    },
    Mint {
        amount: Amount,
        recipient: AccountId,
    },
    Transfer {
        amount: Amount,
        from: AccountId,
        to: AccountId,
    },
    GetBalance {
        account: AccountId,
    },
    GetTotalSupply,
    GetTokenUri,
    SetTokenUri {
        uri: String,
    },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::RegisterStorageProvider { .. } => "register-storage-provider",
            Call::StoreFile { .. } => "store-file",
            Call::RetrieveFile { .. } => "retrieve-file",
            Call::DeleteFile { .. } => "delete-file",
            Call::ProcessPayment { .. } => "process-payment",
            Call::GetFileInfo { .. } => "get-file-info",
            Call::GetStorageProviderInfo { .. } => "get-storage-provider-info",
            Call::Mint { .. } => "mint",
            Call::Transfer { .. } => "transfer",
            Call::GetBalance { .. } => "get-balance",
            Call::GetTotalSupply => "get-total-supply",
            Call::GetTokenUri => "get-token-uri",
            Call::SetTokenUri { .. } => "set-token-uri",
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Call::RetrieveFile { .. }
                | Call::GetFileInfo { .. }
                | Call::GetStorageProviderInfo { .. }
                | Call::GetBalance { .. }
                | Call::GetTotalSupply
                | Call::GetTokenUri
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallOutput {
    None,
    Location(String),
    FileInfo(FileInfo),
    ProviderInfo(ProviderInfo),
    Amount(Amount),
    Uri(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    ProviderRegistered {
        provider: AccountId,
        capacity: u64,
        price_per_block: Amount,
    },
    FileStored {
        file_id: FileId,
        owner: AccountId,
        provider: AccountId,
        size: u64,
    },
    FileDeleted {
        file_id: FileId,
        provider: AccountId,
        size: u64,
    },
    PaymentProcessed {
        file_id: FileId,
        height: Height,
        settled: Amount,
    },
    Minted {
        to: AccountId,
        amount: Amount,
    },
    Transferred {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    TokenUriUpdated {
        uri: String,
    },
}

/// The authoritative storage-market state: registry plus payment token.
///
/// Every mutating operation validates before it writes, so a returned error
/// leaves the ledger exactly as it was.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLedger {
    config: LedgerConfig,
    registry: Registry,
    token: TokenLedger,
    height: Height,
    events: Vec<LedgerEvent>,
}

impl StorageLedger {
    pub fn new(config: LedgerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let token = TokenLedger::new(config.contract_owner.clone(), config.token_uri.clone());
        Ok(Self {
            config,
            registry: Registry::new(),
            token,
            height: 0,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn token(&self) -> &TokenLedger {
        &self.token
    }

    /// Highest height a mutating call has been applied at.
    pub fn height(&self) -> Height {
        self.height
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Hands the journal to the caller and starts a fresh one.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Applies `call` on behalf of `ctx.caller`.
    pub fn execute(&mut self, ctx: &CallContext, call: Call) -> Result<CallOutput> {
        let name = call.name();
        let result = self.dispatch(ctx, call);
        match &result {
            Ok(_) => debug!(call = name, caller = %ctx.caller, height = ctx.height, "call applied"),
            Err(err) => debug!(
                call = name,
                caller = %ctx.caller,
                height = ctx.height,
                code = err.code(),
                error = %err,
                "call rejected"
            ),
        }
        result
    }

    fn dispatch(&mut self, ctx: &CallContext, call: Call) -> Result<CallOutput> {
        match call {
            Call::RegisterStorageProvider {
                available_space,
                price_per_block,
            } => self
                .register_storage_provider(ctx, available_space, price_per_block)
                .map(|_| CallOutput::None),
            Call::StoreFile {
                file_id,
                size,
                provider,
                encrypted_location,
            } => self
                .store_file(ctx, &file_id, size, &provider, &encrypted_location)
                .map(|_| CallOutput::None),
            Call::RetrieveFile { file_id } => self
                .retrieve_file(ctx, &file_id)
                .map(|location| CallOutput::Location(location.to_string())),
            Call::DeleteFile { file_id } => {
                self.delete_file(ctx, &file_id).map(|_| CallOutput::None)
            }
            Call::ProcessPayment { file_id } => {
                self.process_payment(ctx, &file_id).map(|_| CallOutput::None)
            }
            Call::GetFileInfo { file_id } => self.get_file_info(&file_id).map(CallOutput::FileInfo),
            Call::GetStorageProviderInfo { provider } => self
                .get_storage_provider_info(&provider)
                .map(CallOutput::ProviderInfo),
            Call::Mint { amount, recipient } => {
                self.mint(ctx, amount, &recipient).map(|_| CallOutput::None)
            }
            Call::Transfer { amount, from, to } => self
                .transfer(ctx, amount, &from, &to)
                .map(|_| CallOutput::None),
            Call::GetBalance { account } => Ok(CallOutput::Amount(self.get_balance(&account))),
            Call::GetTotalSupply => Ok(CallOutput::Amount(self.get_total_supply())),
            Call::GetTokenUri => Ok(CallOutput::Uri(self.get_token_uri().to_string())),
            Call::SetTokenUri { uri } => self.set_token_uri(ctx, &uri).map(|_| CallOutput::None),
        }
    }

    fn admit(&self, ctx: &CallContext) -> Result<()> {
        if ctx.height < self.height {
            return Err(LedgerError::StaleHeight {
                height: ctx.height,
                current: self.height,
            });
        }
        Ok(())
    }

    fn commit(&mut self, ctx: &CallContext, event: LedgerEvent) {
        self.height = self.height.max(ctx.height);
        self.events.push(event);
    }

    pub fn register_storage_provider(
        &mut self,
        ctx: &CallContext,
        available_space: u64,
        price_per_block: Amount,
    ) -> Result<()> {
        self.admit(ctx)?;
        self.registry
            .register_provider(&ctx.caller, available_space, price_per_block)?;
        self.commit(
            ctx,
            LedgerEvent::ProviderRegistered {
                provider: ctx.caller.clone(),
                capacity: available_space,
                price_per_block,
            },
        );
        Ok(())
    }

    pub fn store_file(
        &mut self,
        ctx: &CallContext,
        file_id: &FileId,
        size: u64,
        provider: &AccountId,
        encrypted_location: &str,
    ) -> Result<()> {
        self.admit(ctx)?;
        self.registry.store_file(
            &ctx.caller,
            file_id,
            size,
            provider,
            encrypted_location,
            ctx.height,
        )?;
        self.commit(
            ctx,
            LedgerEvent::FileStored {
                file_id: file_id.clone(),
                owner: ctx.caller.clone(),
                provider: provider.clone(),
                size,
            },
        );
        Ok(())
    }

    pub fn retrieve_file(&self, ctx: &CallContext, file_id: &FileId) -> Result<&str> {
        self.registry.retrieve_file(&ctx.caller, file_id)
    }

    pub fn delete_file(&mut self, ctx: &CallContext, file_id: &FileId) -> Result<()> {
        self.admit(ctx)?;
        let removed = self.registry.delete_file(&ctx.caller, file_id)?;
        self.commit(
            ctx,
            LedgerEvent::FileDeleted {
                file_id: file_id.clone(),
                provider: removed.storage_provider,
                size: removed.size,
            },
        );
        Ok(())
    }

    /// Records a payment for `file_id` at the caller's height.
    ///
    /// Under [`PaymentPolicy::Settle`] this also charges the file owner
    /// `price_per_block * elapsed` and credits the provider. Returns the
    /// settled amount.
    pub fn process_payment(&mut self, ctx: &CallContext, file_id: &FileId) -> Result<Amount> {
        self.admit(ctx)?;
        let settled = match self.config.payment_policy {
            PaymentPolicy::StampOnly => {
                self.registry.stamp_payment(file_id, ctx.height)?;
                0
            }
            PaymentPolicy::Settle => self.settle_payment(ctx, file_id)?,
        };
        self.commit(
            ctx,
            LedgerEvent::PaymentProcessed {
                file_id: file_id.clone(),
                height: ctx.height,
                settled,
            },
        );
        Ok(settled)
    }

    fn settle_payment(&mut self, ctx: &CallContext, file_id: &FileId) -> Result<Amount> {
        let file = self
            .registry
            .file(file_id)
            .ok_or_else(|| LedgerError::FileNotFound {
                file_id: file_id.clone(),
            })?;
        if ctx.caller != file.owner && &ctx.caller != self.config.billing_agent() {
            return Err(LedgerError::NotPaymentAgent {
                caller: ctx.caller.clone(),
                file_id: file_id.clone(),
            });
        }
        let elapsed = ctx.height.saturating_sub(file.billed_through());
        if elapsed < self.config.payment_interval {
            return Err(LedgerError::PaymentNotDue {
                file_id: file_id.clone(),
                elapsed,
                interval: self.config.payment_interval,
            });
        }
        let provider = self
            .registry
            .provider(&file.storage_provider)
            .ok_or_else(|| LedgerError::ProviderNotFound {
                provider: file.storage_provider.clone(),
            })?;
        let charge = provider
            .price_per_block
            .checked_mul(elapsed)
            .ok_or(LedgerError::Overflow("payment charge"))?;
        let owner = file.owner.clone();
        let provider_id = file.storage_provider.clone();

        self.token.settle(&owner, &provider_id, charge)?;
        self.registry.stamp_payment(file_id, ctx.height)?;
        debug!(%file_id, %owner, provider = %provider_id, elapsed, charge, "storage payment settled");
        Ok(charge)
    }

    pub fn get_file_info(&self, file_id: &FileId) -> Result<FileInfo> {
        self.registry.file_info(file_id)
    }

    pub fn get_storage_provider_info(&self, provider: &AccountId) -> Result<ProviderInfo> {
        self.registry.provider_info(provider)
    }

    pub fn mint(&mut self, ctx: &CallContext, amount: Amount, recipient: &AccountId) -> Result<()> {
        self.admit(ctx)?;
        self.token.mint(&ctx.caller, amount, recipient)?;
        self.commit(
            ctx,
            LedgerEvent::Minted {
                to: recipient.clone(),
                amount,
            },
        );
        Ok(())
    }

    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        amount: Amount,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<()> {
        self.admit(ctx)?;
        self.token.transfer(&ctx.caller, amount, from, to)?;
        self.commit(
            ctx,
            LedgerEvent::Transferred {
                from: from.clone(),
                to: to.clone(),
                amount,
            },
        );
        Ok(())
    }

    pub fn get_balance(&self, account: &AccountId) -> Amount {
        self.token.balance(account)
    }

    pub fn get_total_supply(&self) -> Amount {
        self.token.total_supply()
    }

    pub fn get_token_uri(&self) -> &str {
        self.token.token_uri()
    }

    pub fn set_token_uri(&mut self, ctx: &CallContext, uri: &str) -> Result<()> {
        self.admit(ctx)?;
        self.token.set_token_uri(&ctx.caller, uri)?;
        self.commit(
            ctx,
            LedgerEvent::TokenUriUpdated {
                uri: uri.to_string(),
            },
        );
        Ok(())
    }
}
