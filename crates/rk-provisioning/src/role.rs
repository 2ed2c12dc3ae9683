//! Role Management
//!
//! Creates the `administrator` and `normal` roles and maintains their
//! membership.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{NewRole, Role, RoleName};
use crate::service::{DataService, MembershipChange, RoleQuery};

#[derive(Clone)]
pub struct RoleManager {
    service: Arc<dyn DataService>,
}

impl RoleManager {
    pub fn new(service: Arc<dyn DataService>) -> Self {
        Self { service }
    }

    /// Create `name` with its standard policy and one initial member.
    ///
    /// Not idempotent, and save failures are not retried: a failure is
    /// reported as [`Error::RolePersist`].
    pub async fn create_role(&self, name: RoleName, initial_member: &str) -> Result<Role> {
        let role = NewRole::new(name).with_member(initial_member);

        let created = self
            .service
            .create_role(&role)
            .await
            .map_err(|e| Error::RolePersist {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        info!(role = %name, role_id = %created.id, member = initial_member, "Role created");
        Ok(created)
    }

    /// Add `account_id` to `name`. Succeeds without a write when the account
    /// already holds the role.
    pub async fn add_role(&self, name: RoleName, account_id: &str) -> Result<()> {
        let held = self
            .service
            .find_roles(&RoleQuery::by_name(name).with_member(account_id))
            .await?;

        if !held.is_empty() {
            debug!(role = %name, account_id, "Account already holds role");
            return Ok(());
        }

        let role = self.require_role(name).await?;
        self.service
            .update_role_membership(&role.id, MembershipChange::Add, account_id)
            .await?;

        info!(role = %name, account_id, "Role granted");
        Ok(())
    }

    /// Remove `account_id` from `name`
    pub async fn remove_role(&self, name: RoleName, account_id: &str) -> Result<()> {
        let role = self.require_role(name).await?;
        self.service
            .update_role_membership(&role.id, MembershipChange::Remove, account_id)
            .await?;

        info!(role = %name, account_id, "Role revoked");
        Ok(())
    }

    /// Look a role up by name
    pub async fn find_role(&self, name: RoleName) -> Result<Option<Role>> {
        let roles = self.service.find_roles(&RoleQuery::by_name(name)).await?;
        Ok(roles.into_iter().next())
    }

    async fn require_role(&self, name: RoleName) -> Result<Role> {
        self.find_role(name)
            .await?
            .ok_or_else(|| Error::role_not_found(name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDataService;
    use crate::policy::Grantee;

    #[tokio::test]
    async fn test_create_role_applies_policy_and_member() {
        let service = Arc::new(MemoryDataService::new());
        let manager = RoleManager::new(service.clone());

        let role = manager.create_role(RoleName::Normal, "u1").await.unwrap();

        assert!(role.acl.public_read());
        assert!(role.acl.public_write());
        assert!(role.acl.access(&Grantee::role(RoleName::Normal)).write);
        assert!(service.role_members(RoleName::Normal).contains("u1"));
    }

    #[tokio::test]
    async fn test_create_role_failure_is_role_persist_error() {
        let service = Arc::new(MemoryDataService::new());
        service.fail_role_creation(RoleName::Administrator);
        let manager = RoleManager::new(service);

        let err = manager
            .create_role(RoleName::Administrator, "u1")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RolePersist { ref name, .. } if name == "administrator"));
    }

    #[tokio::test]
    async fn test_create_role_twice_fails() {
        let service = Arc::new(MemoryDataService::new());
        let manager = RoleManager::new(service);

        manager.create_role(RoleName::Normal, "u1").await.unwrap();
        let err = manager.create_role(RoleName::Normal, "u2").await.unwrap_err();

        assert_eq!(err.code(), "ROLE_PERSIST_ERROR");
    }

    #[tokio::test]
    async fn test_add_role_is_idempotent() {
        let service = Arc::new(MemoryDataService::new());
        let manager = RoleManager::new(service.clone());
        manager.create_role(RoleName::Normal, "u1").await.unwrap();

        manager.add_role(RoleName::Normal, "u2").await.unwrap();
        let writes = service.role_membership_writes();
        manager.add_role(RoleName::Normal, "u2").await.unwrap();

        assert_eq!(service.role_members(RoleName::Normal).len(), 2);
        assert_eq!(service.role_membership_writes(), writes);
    }

    #[tokio::test]
    async fn test_add_role_requires_existing_role() {
        let service = Arc::new(MemoryDataService::new());
        let manager = RoleManager::new(service);

        assert_eq!(
            manager.add_role(RoleName::Normal, "u1").await,
            Err(Error::role_not_found("normal"))
        );
    }

    #[tokio::test]
    async fn test_remove_role() {
        let service = Arc::new(MemoryDataService::new());
        let manager = RoleManager::new(service.clone());
        manager.create_role(RoleName::Administrator, "u1").await.unwrap();
        manager.add_role(RoleName::Administrator, "u2").await.unwrap();

        manager.remove_role(RoleName::Administrator, "u2").await.unwrap();

        let members = service.role_members(RoleName::Administrator);
        assert!(members.contains("u1"));
        assert!(!members.contains("u2"));
    }

    #[tokio::test]
    async fn test_remove_role_requires_existing_role() {
        let service = Arc::new(MemoryDataService::new());
        let manager = RoleManager::new(service);

        assert!(manager
            .remove_role(RoleName::Administrator, "u1")
            .await
            .unwrap_err()
            .is_precondition());
    }
}
