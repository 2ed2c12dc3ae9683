//! Remote Data Service
//!
//! The query, save and remote-procedure primitives the provisioning layer
//! consumes. Components receive an `Arc<dyn DataService>` so tests can swap
//! in [`MemoryDataService`](crate::memory::MemoryDataService).

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Account, AccountPatch, Group, NewRole, Role, RoleName, SignUpRequest};

/// Filter for account listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountQuery {
    /// Only return accounts whose `verify` flag is `true`
    pub verified_only: bool,
}

/// Filter for role lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleQuery {
    pub name: RoleName,
    /// Restrict to roles containing this account
    pub member: Option<String>,
}

impl RoleQuery {
    pub fn by_name(name: RoleName) -> Self {
        Self { name, member: None }
    }

    pub fn with_member(mut self, account_id: impl Into<String>) -> Self {
        self.member = Some(account_id.into());
        self
    }
}

/// Role membership mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Add,
    Remove,
}

/// Trait for remote data service backends
#[async_trait]
pub trait DataService: Send + Sync {
    /// Create an account. On success the new account is signed in.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Account>;

    /// Authenticate with username and password; the account becomes current.
    async fn log_in(&self, username: &str, password: &str) -> Result<Account>;

    /// Restore a session from its token; the account becomes current.
    async fn become_session(&self, session_token: &str) -> Result<Account>;

    /// The signed-in account, if any
    fn current_account(&self) -> Option<Account>;

    /// Forget the signed-in account
    async fn log_out(&self) -> Result<()>;

    async fn find_accounts_by_username(&self, username: &str) -> Result<Vec<Account>>;

    /// Number of accounts in the store, the caller's own included
    async fn count_accounts(&self) -> Result<u64>;

    /// Accounts matching the query, ascending by `memberIndex`
    async fn query_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>>;

    /// Persist the fields set in `patch`
    async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<()>;

    async fn find_roles(&self, query: &RoleQuery) -> Result<Vec<Role>>;

    async fn create_role(&self, role: &NewRole) -> Result<Role>;

    async fn update_role_membership(
        &self,
        role_id: &str,
        change: MembershipChange,
        account_id: &str,
    ) -> Result<()>;

    /// Groups ascending by index
    async fn find_groups(&self) -> Result<Vec<Group>>;

    async fn create_group(&self, group: &Group) -> Result<()>;

    /// Invoke a server-side function by name
    async fn run_function(&self, name: &str, params: serde_json::Value)
        -> Result<serde_json::Value>;
}
