//! HTTP Data Service
//!
//! [`DataService`] over a LeanCloud-compatible REST API (`/1.1/...`).
//! Requests carry `X-LC-Id` / `X-LC-Key`, plus `X-LC-Session` once an
//! account is signed in. Error bodies have the form
//! `{ "code": n, "error": "..." }`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use rk_config::ServiceConfig;

use crate::error::{Error, Result};
use crate::model::{Account, AccountPatch, Group, NewRole, Role, SignUpRequest};
use crate::service::{AccountQuery, DataService, MembershipChange, RoleQuery};

/// Rows per query page, the server-side maximum
const PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    error: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedResponse {
    object_id: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    session_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FunctionResponse {
    #[serde(default)]
    result: Value,
}

fn user_pointer(account_id: &str) -> Value {
    json!({ "__type": "Pointer", "className": "_User", "objectId": account_id })
}

fn relation_op(change: MembershipChange, account_ids: &[String]) -> Value {
    let op = match change {
        MembershipChange::Add => "AddRelation",
        MembershipChange::Remove => "RemoveRelation",
    };
    let objects: Vec<Value> = account_ids.iter().map(|id| user_pointer(id)).collect();
    json!({ "__op": op, "objects": objects })
}

fn api_error(status: StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => Error::Api {
            status: status.as_u16(),
            code: parsed.code,
            message: parsed.error,
        },
        Err(_) => Error::Api {
            status: status.as_u16(),
            code: -1,
            message: if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            },
        },
    }
}

/// REST client for the remote data service
#[derive(Debug)]
pub struct RestDataService {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_key: String,
    session: RwLock<Option<Account>>,
}

impl RestDataService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        if config.server_url.trim().is_empty() {
            return Err(Error::Config("service.server_url is required".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!("RosterKit/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_key: config.app_key.clone(),
            session: RwLock::new(None),
        })
    }

    fn session_token(&self) -> Option<String> {
        self.session
            .read()
            .as_ref()
            .and_then(|account| account.session_token.clone())
    }

    fn set_session(&self, account: &Account) {
        *self.session.write() = Some(account.clone());
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let token = self.session_token();
        self.request_as(method, path, token.as_deref())
    }

    fn request_as(&self, method: Method, path: &str, session: Option<&str>) -> RequestBuilder {
        let url = format!("{}/1.1{}", self.base_url, path);
        debug!(%method, %url, "Remote data service request");

        let builder = self
            .http
            .request(method, url)
            .header("X-LC-Id", &self.app_id)
            .header("X-LC-Key", &self.app_key);

        match session {
            Some(token) => builder.header("X-LC-Session", token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    /// Run a `where` query, following `skip` until a short page comes back
    async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: Value,
        order: Option<&str>,
    ) -> Result<Vec<T>> {
        let filter = filter.to_string();
        let mut results = Vec::new();

        loop {
            let mut params = vec![
                ("where", filter.clone()),
                ("limit", PAGE_SIZE.to_string()),
                ("skip", results.len().to_string()),
            ];
            if let Some(order) = order {
                params.push(("order", order.to_string()));
            }

            let page: QueryResponse<T> = self
                .send(self.request(Method::GET, path).query(&params))
                .await?;
            let fetched = page.results.len();
            results.extend(page.results);

            if fetched < PAGE_SIZE {
                return Ok(results);
            }
            debug!(path, fetched = results.len(), "Full page returned, fetching the next one");
        }
    }
}

#[async_trait]
impl DataService for RestDataService {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Account> {
        let mut body = json!({
            "username": request.username,
            "password": request.password,
        });
        if let Some(ref email) = request.email {
            body["email"] = json!(email);
        }
        if let Some(index) = request.group_index {
            body["groupIndex"] = json!(index);
        }
        if let Some(ref name) = request.group_name {
            body["groupName"] = json!(name);
        }

        let created: CreatedResponse = self
            .send(self.request_as(Method::POST, "/users", None).json(&body))
            .await?;

        let mut account = Account::new(created.object_id, request.username.clone());
        account.email = request.email.clone();
        account.group_index = request.group_index;
        account.group_name = request.group_name.clone();
        account.session_token = created.session_token;
        account.created_at = created.created_at;

        self.set_session(&account);
        Ok(account)
    }

    async fn log_in(&self, username: &str, password: &str) -> Result<Account> {
        let body = json!({ "username": username, "password": password });
        let account: Account = self
            .send(self.request_as(Method::POST, "/login", None).json(&body))
            .await?;

        self.set_session(&account);
        Ok(account)
    }

    async fn become_session(&self, session_token: &str) -> Result<Account> {
        let mut account: Account = self
            .send(self.request_as(Method::GET, "/users/me", Some(session_token)))
            .await?;
        if account.session_token.is_none() {
            account.session_token = Some(session_token.to_string());
        }

        self.set_session(&account);
        Ok(account)
    }

    fn current_account(&self) -> Option<Account> {
        self.session.read().clone()
    }

    async fn log_out(&self) -> Result<()> {
        *self.session.write() = None;
        Ok(())
    }

    async fn find_accounts_by_username(&self, username: &str) -> Result<Vec<Account>> {
        self.query("/users", json!({ "username": username }), None)
            .await
    }

    async fn count_accounts(&self) -> Result<u64> {
        let params = [("where", "{}"), ("count", "1"), ("limit", "0")];
        let response: QueryResponse<Value> = self
            .send(self.request(Method::GET, "/users").query(&params))
            .await?;
        Ok(response.count.unwrap_or(0))
    }

    async fn query_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>> {
        let filter = if query.verified_only {
            json!({ "verify": true })
        } else {
            json!({})
        };
        self.query("/users", filter, Some("memberIndex")).await
    }

    async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let _: Value = self
            .send(
                self.request(Method::PUT, &format!("/users/{}", account_id))
                    .json(patch),
            )
            .await?;

        let mut session = self.session.write();
        if let Some(current) = session.as_mut().filter(|current| current.id == account_id) {
            patch.apply_to(current);
        }
        Ok(())
    }

    async fn find_roles(&self, query: &RoleQuery) -> Result<Vec<Role>> {
        let mut filter = json!({ "name": query.name });
        if let Some(ref member) = query.member {
            filter["users"] = user_pointer(member);
        }
        self.query("/roles", filter, None).await
    }

    async fn create_role(&self, role: &NewRole) -> Result<Role> {
        let mut body = json!({
            "name": role.name,
            "ACL": role.acl,
        });
        if !role.members.is_empty() {
            body["users"] = relation_op(MembershipChange::Add, &role.members);
        }

        let created: CreatedResponse = self
            .send(self.request(Method::POST, "/roles").json(&body))
            .await?;

        Ok(Role {
            id: created.object_id,
            name: role.name,
            acl: role.acl.clone(),
            members: role.members.iter().cloned().collect(),
        })
    }

    async fn update_role_membership(
        &self,
        role_id: &str,
        change: MembershipChange,
        account_id: &str,
    ) -> Result<()> {
        let body = json!({ "users": relation_op(change, &[account_id.to_string()]) });
        let _: Value = self
            .send(
                self.request(Method::PUT, &format!("/roles/{}", role_id))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn find_groups(&self) -> Result<Vec<Group>> {
        self.query("/classes/Group", json!({}), Some("index")).await
    }

    async fn create_group(&self, group: &Group) -> Result<()> {
        let _: CreatedResponse = self
            .send(self.request(Method::POST, "/classes/Group").json(group))
            .await?;
        Ok(())
    }

    async fn run_function(&self, name: &str, params: Value) -> Result<Value> {
        let response: FunctionResponse = self
            .send(
                self.request(Method::POST, &format!("/functions/{}", name))
                    .json(&params),
            )
            .await?;
        Ok(response.result)
    }
}
