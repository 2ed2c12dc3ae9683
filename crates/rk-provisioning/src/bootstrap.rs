//! Bootstrap Orchestration
//!
//! The very first account sets the application up:
//!
//! 1. concurrently create the `administrator` and `normal` roles with the
//!    account as member, and flag the account as administrator
//! 2. concurrently seed the configured groups and initialize the account ACL
//! 3. assign the account to the first configured group
//!
//! Each stage is an all-must-succeed join. A failed stage is not rolled
//! back; running the bootstrap again resumes it, because roles and groups
//! that already exist are reused instead of created a second time.
//!
//! Every later account takes the member path: `normal` role, then ACL.

use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::acl::AccountAclInitializer;
use crate::error::{Error, Result};
use crate::model::{Account, AccountPatch, Group, RoleName};
use crate::role::RoleManager;
use crate::service::DataService;

#[derive(Clone)]
pub struct BootstrapOrchestrator {
    service: Arc<dyn DataService>,
    roles: RoleManager,
    acl: AccountAclInitializer,
    groups: Vec<Group>,
}

impl BootstrapOrchestrator {
    pub fn new(service: Arc<dyn DataService>, groups: Vec<Group>) -> Self {
        Self {
            roles: RoleManager::new(Arc::clone(&service)),
            acl: AccountAclInitializer::new(Arc::clone(&service)),
            service,
            groups,
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Run the first-account sequence for `account`
    pub async fn bootstrap(&self, account: &mut Account) -> Result<()> {
        let first_group = self
            .groups
            .first()
            .cloned()
            .ok_or_else(|| Error::Config("no groups configured for bootstrap".to_string()))?;

        let span = info_span!("bootstrap", account_id = %account.id, username = %account.username);
        async move {
            let account_id = account.id.clone();

            let admin = AccountPatch::default().with_admin(true);
            futures::try_join!(
                self.ensure_role(RoleName::Administrator, &account_id),
                self.ensure_role(RoleName::Normal, &account_id),
                self.service.update_account(&account_id, &admin),
            )?;
            admin.apply_to(account);
            info!("Roles created and administrator flag set");

            let (seeded, ()) =
                futures::try_join!(self.seed_groups(), self.acl.initialize_acl(account))?;
            info!(seeded, "Groups seeded and ACL initialized");

            let assignment = AccountPatch::default().with_group(&first_group);
            self.service.update_account(&account_id, &assignment).await?;
            assignment.apply_to(account);

            info!(group = %first_group.name, "Bootstrap complete");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Provision an account that is not the first one
    pub async fn provision_member(&self, account: &mut Account) -> Result<()> {
        self.roles.add_role(RoleName::Normal, &account.id).await?;
        self.acl.initialize_acl(account).await?;

        info!(account_id = %account.id, username = %account.username, "Member provisioned");
        Ok(())
    }

    /// Create the role, or join it when an earlier run already created it
    async fn ensure_role(&self, name: RoleName, account_id: &str) -> Result<()> {
        match self.roles.find_role(name).await? {
            Some(_) => self.roles.add_role(name, account_id).await,
            None => self.roles.create_role(name, account_id).await.map(|_| ()),
        }
    }

    /// Create every configured group whose index is not stored yet.
    /// Returns the number created.
    async fn seed_groups(&self) -> Result<usize> {
        let existing: BTreeSet<u32> = self
            .service
            .find_groups()
            .await?
            .into_iter()
            .map(|group| group.index)
            .collect();

        let missing: Vec<&Group> = self
            .groups
            .iter()
            .filter(|group| !existing.contains(&group.index))
            .collect();

        try_join_all(missing.iter().map(|group| self.service.create_group(group))).await?;
        Ok(missing.len())
    }
}
