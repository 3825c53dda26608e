use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{LedgerError, Result};
use crate::types::{AccountId, Amount};

/// Fungible payment token: balances, total supply and metadata URI.
///
/// Zero balances are not stored, so two ledgers holding the same amounts
/// compare equal regardless of history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenLedger {
    owner: AccountId,
    balances: BTreeMap<AccountId, Amount>,
    total_supply: Amount,
    token_uri: String,
}

impl TokenLedger {
    pub fn new(owner: impl Into<AccountId>, token_uri: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            balances: BTreeMap::new(),
            total_supply: 0,
            token_uri: token_uri.into(),
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn balances(&self) -> &BTreeMap<AccountId, Amount> {
        &self.balances
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    fn ensure_owner(&self, caller: &AccountId) -> Result<()> {
        if caller != &self.owner {
            return Err(LedgerError::OwnerOnly {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    pub fn mint(&mut self, caller: &AccountId, amount: Amount, recipient: &AccountId) -> Result<()> {
        self.ensure_owner(caller)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("total supply"))?;
        let balance = self
            .balance(recipient)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("balance"))?;

        self.total_supply = total_supply;
        self.balances.insert(recipient.clone(), balance);
        trace!(%recipient, amount, total_supply, "minted");
        Ok(())
    }

    pub fn transfer(
        &mut self,
        caller: &AccountId,
        amount: Amount,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<()> {
        if caller != from {
            return Err(LedgerError::NotTokenOwner {
                caller: caller.clone(),
                from: from.clone(),
            });
        }
        let balance = self.balance(from);
        if balance < amount {
            return Err(LedgerError::TransferFailed {
                from: from.clone(),
                amount,
                balance,
            });
        }
        self.move_funds(from, to, amount);
        Ok(())
    }

    /// Charges `amount` from `from` to `to` on behalf of the registry.
    pub(crate) fn settle(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        let available = self.balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                account: from.clone(),
                required: amount,
                available,
            });
        }
        self.move_funds(from, to, amount);
        Ok(())
    }

    // Callers have checked `balance(from) >= amount`.
    fn move_funds(&mut self, from: &AccountId, to: &AccountId, amount: Amount) {
        if from == to || amount == 0 {
            return;
        }
        let remaining = self.balance(from) - amount;
        if remaining == 0 {
            self.balances.remove(from);
        } else {
            self.balances.insert(from.clone(), remaining);
        }
        *self.balances.entry(to.clone()).or_insert(0) += amount;
        trace!(%from, %to, amount, "funds moved");
    }

    pub fn set_token_uri(&mut self, caller: &AccountId, uri: &str) -> Result<()> {
        self.ensure_owner(caller)?;
        self.token_uri = uri.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "owner";

    fn id(s: &str) -> AccountId {
        s.to_string()
    }

    fn ledger() -> TokenLedger {
        TokenLedger::new(OWNER, "https://example.com/storage-token-metadata")
    }

    #[test]
    fn mint_increases_balance_and_supply() {
        let mut token = ledger();
        token.mint(&id(OWNER), 1_000, &id("u1")).unwrap();
        token.mint(&id(OWNER), 500, &id("u2")).unwrap();
        assert_eq!(token.balance(&id("u1")), 1_000);
        assert_eq!(token.balance(&id("u2")), 500);
        assert_eq!(token.total_supply(), 1_500);
        assert_eq!(token.owner(), OWNER);
    }

    #[test]
    fn non_owner_cannot_mint_or_set_uri() {
        let mut token = ledger();
        let err = token.mint(&id("u1"), 1_000, &id("u1")).unwrap_err();
        assert_eq!(err.code(), 100);
        let err = token.set_token_uri(&id("u1"), "https://evil").unwrap_err();
        assert_eq!(err.code(), 100);
        assert_eq!(token, ledger());
    }

    #[test]
    fn zero_mint_is_rejected() {
        let mut token = ledger();
        assert_eq!(
            token.mint(&id(OWNER), 0, &id("u1")).unwrap_err(),
            LedgerError::InvalidAmount
        );
    }

    #[test]
    fn supply_overflow_is_rejected() {
        let mut token = ledger();
        token.mint(&id(OWNER), u64::MAX, &id("u1")).unwrap();
        let before = token.clone();
        let err = token.mint(&id(OWNER), 1, &id("u2")).unwrap_err();
        assert_eq!(err, LedgerError::Overflow("total supply"));
        assert_eq!(token, before);
    }

    #[test]
    fn transfer_moves_funds() {
        let mut token = ledger();
        token.mint(&id(OWNER), 1_000, &id("u1")).unwrap();
        token.transfer(&id("u1"), 500, &id("u1"), &id("u2")).unwrap();
        assert_eq!(token.balance(&id("u1")), 500);
        assert_eq!(token.balance(&id("u2")), 500);
        assert_eq!(token.total_supply(), 1_000);
    }

    #[test]
    fn transfer_requires_sender_and_balance() {
        let mut token = ledger();
        token.mint(&id(OWNER), 1_000, &id("u1")).unwrap();
        let before = token.clone();

        let err = token.transfer(&id("u2"), 10, &id("u1"), &id("u2")).unwrap_err();
        assert!(matches!(err, LedgerError::NotTokenOwner { .. }));
        let err = token
            .transfer(&id("u1"), 1_500, &id("u1"), &id("u2"))
            .unwrap_err();
        assert_eq!(err.code(), 1);
        assert_eq!(token, before);
    }

    #[test]
    fn self_transfer_needs_balance_but_changes_nothing() {
        let mut token = ledger();
        token.mint(&id(OWNER), 100, &id("u1")).unwrap();
        let before = token.clone();
        token.transfer(&id("u1"), 100, &id("u1"), &id("u1")).unwrap();
        assert_eq!(token, before);
        let err = token.transfer(&id("u1"), 101, &id("u1"), &id("u1")).unwrap_err();
        assert!(matches!(err, LedgerError::TransferFailed { .. }));
    }

    #[test]
    fn zero_transfer_by_sender_is_a_no_op() {
        let mut token = ledger();
        token.transfer(&id("u1"), 0, &id("u1"), &id("u2")).unwrap();
        assert_eq!(token, ledger());

        token.mint(&id(OWNER), 10, &id("u1")).unwrap();
        let before = token.clone();
        token.transfer(&id("u1"), 0, &id("u1"), &id("u2")).unwrap();
        assert_eq!(token, before);
        assert!(!token.balances().contains_key("u2"));
    }

    #[test]
    fn emptied_accounts_are_pruned() {
        let mut token = ledger();
        token.mint(&id(OWNER), 100, &id("u1")).unwrap();
        token.transfer(&id("u1"), 100, &id("u1"), &id("u2")).unwrap();
        assert!(!token.balances().contains_key("u1"));
        assert_eq!(token.balance(&id("u1")), 0);
    }

    #[test]
    fn settle_reports_insufficient_funds() {
        let mut token = ledger();
        token.mint(&id(OWNER), 50, &id("u1")).unwrap();
        let err = token.settle(&id("u1"), &id("p1"), 80).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                account: id("u1"),
                required: 80,
                available: 50,
            }
        );
        token.settle(&id("u1"), &id("p1"), 50).unwrap();
        assert_eq!(token.balance(&id("p1")), 50);
    }

    #[test]
    fn owner_updates_uri() {
        let mut token = ledger();
        token
            .set_token_uri(&id(OWNER), "https://example.com/new-metadata")
            .unwrap();
        assert_eq!(token.token_uri(), "https://example.com/new-metadata");
    }
}
