//! Verification Gate
//!
//! Precondition check run before any login reaches the remote store.

use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Account;
use crate::service::DataService;

#[derive(Clone)]
pub struct VerificationGate {
    service: Arc<dyn DataService>,
}

impl VerificationGate {
    pub fn new(service: Arc<dyn DataService>) -> Self {
        Self { service }
    }

    /// Succeeds only when exactly one account has `username` and its
    /// `verify` flag is `true`.
    pub async fn check_verified(&self, username: &str) -> Result<()> {
        let accounts = self.service.find_accounts_by_username(username).await?;

        match accounts.as_slice() {
            [] => Err(Error::account_not_found(username)),
            [account] => {
                ensure_verified(account)?;
                debug!(username, "Account is verified");
                Ok(())
            }
            many => Err(Error::DuplicateAccount {
                username: username.to_string(),
                count: many.len(),
            }),
        }
    }
}

/// Fail with [`Error::NotYetVerified`] unless the account is verified
pub fn ensure_verified(account: &Account) -> Result<()> {
    if account.is_verified() {
        Ok(())
    } else {
        Err(Error::not_yet_verified(&account.username))
    }
}
