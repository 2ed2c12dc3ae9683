//! Account ACL initialization.

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::model::{Account, AccountPatch};
use crate::policy::AccessControlPolicy;
use crate::service::DataService;

/// Attaches the owning-account policy to a freshly created account
#[derive(Clone)]
pub struct AccountAclInitializer {
    service: Arc<dyn DataService>,
}

impl AccountAclInitializer {
    pub fn new(service: Arc<dyn DataService>) -> Self {
        Self { service }
    }

    /// Set and persist the policy {public read, no public write, self write,
    /// administrator write}. Until this has run the account is not fully
    /// provisioned.
    pub async fn initialize_acl(&self, account: &mut Account) -> Result<()> {
        let patch = AccountPatch::default().with_acl(AccessControlPolicy::for_account(&account.id));

        self.service.update_account(&account.id, &patch).await?;
        patch.apply_to(account);

        info!(account_id = %account.id, username = %account.username, "Account ACL initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDataService;

    #[tokio::test]
    async fn test_initialize_acl_persists_policy() {
        let service = Arc::new(MemoryDataService::new());
        let mut account = service.insert_account("alice", "pw", true);
        let initializer = AccountAclInitializer::new(service.clone());

        initializer.initialize_acl(&mut account).await.unwrap();

        assert!(account.is_provisioned());
        let stored = service.account(&account.id).unwrap();
        assert!(stored.is_provisioned());
    }

    #[tokio::test]
    async fn test_initialize_acl_unknown_account_fails() {
        let service = Arc::new(MemoryDataService::new());
        let mut account = Account::new("missing", "ghost");
        let initializer = AccountAclInitializer::new(service);

        assert!(initializer.initialize_acl(&mut account).await.is_err());
        assert!(!account.is_provisioned());
    }
}
