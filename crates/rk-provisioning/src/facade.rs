//! Provisioning Facade
//!
//! The public surface used by the presentation layer. It wires the
//! components together around one injected [`DataService`], and acts as the
//! error boundary: every failure is logged once with its code and then
//! returned unchanged.

use std::sync::Arc;
use tracing::{info, warn};

use rk_config::AppConfig;

use crate::bootstrap::BootstrapOrchestrator;
use crate::cache::AccountCache;
use crate::error::Result;
use crate::model::{Account, Group, RoleName, SignUpRequest};
use crate::procedure::{
    DeleteUserRequest, ProcedureInvoker, SavePersonRequest, SignUpConfirmRequest,
    VerifyUserRequest,
};
use crate::rest::RestDataService;
use crate::retry::RetryPolicy;
use crate::role::RoleManager;
use crate::service::DataService;
use crate::verification::{ensure_verified, VerificationGate};

/// Settings consumed by the facade
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningSettings {
    pub retry: RetryPolicy,
    /// Groups seeded at bootstrap, first one assigned to the first account
    pub groups: Vec<Group>,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ProvisioningSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            retry: RetryPolicy::from(&config.procedures),
            groups: config.groups.iter().map(Group::from).collect(),
        }
    }
}

pub struct Provisioning {
    service: Arc<dyn DataService>,
    gate: VerificationGate,
    roles: RoleManager,
    bootstrap: BootstrapOrchestrator,
    procedures: ProcedureInvoker,
    accounts: AccountCache,
}

impl Provisioning {
    pub fn new(service: Arc<dyn DataService>, settings: ProvisioningSettings) -> Self {
        Self {
            gate: VerificationGate::new(Arc::clone(&service)),
            roles: RoleManager::new(Arc::clone(&service)),
            bootstrap: BootstrapOrchestrator::new(Arc::clone(&service), settings.groups),
            procedures: ProcedureInvoker::new(Arc::clone(&service), settings.retry),
            accounts: AccountCache::new(Arc::clone(&service)),
            service,
        }
    }

    /// Build a facade talking to the configured remote service
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let service = RestDataService::new(&config.service)?;
        Ok(Self::new(
            Arc::new(service),
            ProvisioningSettings::from(config),
        ))
    }

    pub fn service(&self) -> &Arc<dyn DataService> {
        &self.service
    }

    /// Fails unless `username` names exactly one verified account
    pub async fn is_verified(&self, username: &str) -> Result<()> {
        surface("is_verified", self.gate.check_verified(username).await)
    }

    /// Log in after the verification gate lets the account through
    pub async fn log_in(&self, username: &str, password: &str) -> Result<Account> {
        surface("log_in", self.gated_log_in(username, password).await)
    }

    /// Restore a session from its token. An unverified account is signed
    /// out again and rejected.
    pub async fn session_token_log_in(&self, session_token: &str) -> Result<Account> {
        surface(
            "session_token_log_in",
            self.restore_session(session_token).await,
        )
    }

    pub fn current_account(&self) -> Option<Account> {
        self.service.current_account()
    }

    pub async fn log_out(&self) -> Result<()> {
        surface("log_out", self.service.log_out().await)
    }

    /// Create an account and provision it. The first account ever created
    /// bootstraps the application and becomes administrator; every other
    /// account joins the `normal` role.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<Account> {
        surface("sign_up", self.create_and_provision(&request).await)
    }

    /// Run the server-side post-sign-up confirmation
    pub async fn request_verification(&self) -> Result<()> {
        let result = self.procedures.invoke(&SignUpConfirmRequest {}).await;
        surface("request_verification", result.map(|_| ()))
    }

    /// Persist a per-account payload through the server
    pub async fn save_person(&self, id: &str, data: serde_json::Value) -> Result<()> {
        let request = SavePersonRequest {
            id: id.to_string(),
            data,
        };
        let result = self.procedures.invoke(&request).await;
        surface("save_person", result.map(|_| ()))
    }

    /// Mark an account verified so it can log in
    pub async fn verify_account(&self, account_id: &str) -> Result<()> {
        let request = VerifyUserRequest {
            target_user: account_id.to_string(),
        };
        let result = self.procedures.invoke(&request).await;
        surface("verify_account", result.map(|_| ()))
    }

    pub async fn delete_account(&self, account_id: &str) -> Result<()> {
        let request = DeleteUserRequest {
            target_user: account_id.to_string(),
        };
        let result = self.procedures.invoke(&request).await;
        surface("delete_account", result.map(|_| ()))
    }

    /// List accounts, see [`AccountCache`] for the caching rules
    pub async fn all_accounts(
        &self,
        use_cache: bool,
        include_unverified: bool,
    ) -> Result<Arc<Vec<Account>>> {
        surface(
            "all_accounts",
            self.accounts.list_accounts(use_cache, include_unverified).await,
        )
    }

    pub fn invalidate_accounts(&self) {
        self.accounts.invalidate();
    }

    pub async fn add_role(&self, name: RoleName, account_id: &str) -> Result<()> {
        surface("add_role", self.roles.add_role(name, account_id).await)
    }

    pub async fn remove_role(&self, name: RoleName, account_id: &str) -> Result<()> {
        surface("remove_role", self.roles.remove_role(name, account_id).await)
    }

    async fn gated_log_in(&self, username: &str, password: &str) -> Result<Account> {
        self.gate.check_verified(username).await?;
        let account = self.service.log_in(username, password).await?;
        info!(username, "Logged in");
        Ok(account)
    }

    async fn restore_session(&self, session_token: &str) -> Result<Account> {
        let account = self.service.become_session(session_token).await?;
        if let Err(err) = ensure_verified(&account) {
            self.service.log_out().await?;
            return Err(err);
        }
        info!(username = %account.username, "Session restored");
        Ok(account)
    }

    async fn create_and_provision(&self, request: &SignUpRequest) -> Result<Account> {
        request.validate()?;

        let mut account = self.service.sign_up(request).await?;
        info!(username = %account.username, account_id = %account.id, "Account signed up");

        // The count includes the account just created
        let count = self.service.count_accounts().await?;
        if count > 1 {
            self.bootstrap.provision_member(&mut account).await?;
        } else {
            self.bootstrap.bootstrap(&mut account).await?;
        }

        Ok(account)
    }
}

/// Log a failed operation once, then hand the result back untouched
fn surface<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(ref err) = result {
        warn!(
            operation,
            code = err.code(),
            error = %err,
            "Provisioning operation failed"
        );
    }
    result
}
