use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Height};

pub const DEFAULT_TOKEN_URI: &str = "https://example.com/storage-token-metadata";
pub const DEFAULT_PAYMENT_INTERVAL: Height = 144;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// How `process-payment` behaves.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPolicy {
    /// Any caller may stamp the payment height; no tokens move.
    #[default]
    StampOnly,
    /// Owner or billing agent only, interval enforced, tokens move from
    /// file owner to provider.
    Settle,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    pub contract_owner: AccountId,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_payment_interval")]
    pub payment_interval: Height,
    #[serde(default)]
    pub payment_policy: PaymentPolicy,
    #[serde(default)]
    pub billing_agent: Option<AccountId>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_payment_interval() -> Height {
    DEFAULT_PAYMENT_INTERVAL
}

impl LedgerConfig {
    pub fn new(contract_owner: impl Into<AccountId>) -> Self {
        Self {
            contract_owner: contract_owner.into(),
            token_uri: default_token_uri(),
            payment_interval: DEFAULT_PAYMENT_INTERVAL,
            payment_policy: PaymentPolicy::default(),
            billing_agent: None,
        }
    }

    pub fn with_payment_policy(mut self, policy: PaymentPolicy) -> Self {
        self.payment_policy = policy;
        self
    }

    pub fn with_payment_interval(mut self, interval: Height) -> Self {
        self.payment_interval = interval;
        self
    }

    pub fn with_billing_agent(mut self, agent: impl Into<AccountId>) -> Self {
        self.billing_agent = Some(agent.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contract_owner.trim().is_empty() {
            return Err(ConfigError::Invalid("contract_owner must not be empty"));
        }
        if matches!(&self.billing_agent, Some(agent) if agent.trim().is_empty()) {
            return Err(ConfigError::Invalid("billing_agent must not be empty"));
        }
        Ok(())
    }

    /// Identity allowed to trigger settlement besides the file owner.
    pub fn billing_agent(&self) -> &AccountId {
        self.billing_agent.as_ref().unwrap_or(&self.contract_owner)
    }
}
