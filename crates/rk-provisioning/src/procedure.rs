//! Remote Procedure Invocation
//!
//! Typed requests for the server-side functions used by account lifecycle
//! actions, and an invoker that retries them under a [`RetryPolicy`].
//!
//! The invoker enforces no idempotency of its own. Every procedure below
//! is safe to run more than once.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::retry::{retry_fixed, RetryPolicy};
use crate::service::DataService;

/// A named server-side function with a typed request and response
pub trait Procedure: Serialize + Send + Sync {
    /// Function name on the server
    const NAME: &'static str;

    type Output: DeserializeOwned;
}

/// Ask the server to run its post-sign-up confirmation for the current account
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpConfirmRequest {}

impl Procedure for SignUpConfirmRequest {
    const NAME: &'static str = "userSignUp";
    type Output = serde_json::Value;
}

/// Persist an arbitrary per-account payload
#[derive(Debug, Clone, Serialize)]
pub struct SavePersonRequest {
    pub id: String,
    pub data: serde_json::Value,
}

impl Procedure for SavePersonRequest {
    const NAME: &'static str = "savePersonData";
    type Output = serde_json::Value;
}

/// Mark an account as verified
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyUserRequest {
    pub target_user: String,
}

impl Procedure for VerifyUserRequest {
    const NAME: &'static str = "verifyUser";
    type Output = serde_json::Value;
}

/// Delete an account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    pub target_user: String,
}

impl Procedure for DeleteUserRequest {
    const NAME: &'static str = "deleteUser";
    type Output = serde_json::Value;
}

/// Invokes remote procedures with bounded, fixed-delay retries
#[derive(Clone)]
pub struct ProcedureInvoker {
    service: Arc<dyn DataService>,
    policy: RetryPolicy,
}

impl ProcedureInvoker {
    pub fn new(service: Arc<dyn DataService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `request`, retrying every failure until the policy is spent.
    ///
    /// Fails with [`Error::RemoteProcedureExhausted`] carrying the last
    /// failure's message once all attempts have failed.
    pub async fn invoke<P: Procedure>(&self, request: &P) -> Result<P::Output> {
        let params = serde_json::to_value(request)?;
        let service = Arc::clone(&self.service);

        let value = retry_fixed(&self.policy, move |attempt| {
            let service = Arc::clone(&service);
            let params = params.clone();
            async move {
                debug!(procedure = P::NAME, attempt, "Invoking remote procedure");
                service.run_function(P::NAME, params).await
            }
        })
        .await
        .map_err(|exhausted| Error::RemoteProcedureExhausted {
            procedure: P::NAME.to_string(),
            attempts: exhausted.attempts,
            last_error: exhausted.last_error.to_string(),
        })?;

        info!(procedure = P::NAME, "Remote procedure completed");
        Ok(serde_json::from_value(value)?)
    }
}
