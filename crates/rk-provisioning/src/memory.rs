//! In-Memory Data Service
//!
//! A [`DataService`] held entirely in process memory. Used by the test
//! suites and by `rk-dev demo`. Besides the trait it offers inspection
//! helpers and failure injection.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::model::{Account, AccountPatch, Group, NewRole, Role, RoleName, SignUpRequest};
use crate::service::{AccountQuery, DataService, MembershipChange, RoleQuery};

struct StoredAccount {
    account: Account,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    accounts: Vec<StoredAccount>,
    roles: Vec<Role>,
    groups: Vec<Group>,
    person_data: HashMap<String, Value>,
    current: Option<String>,
    next_member_index: i64,

    // Instrumentation
    account_queries: usize,
    role_membership_writes: usize,
    procedure_calls: HashMap<String, u32>,

    // Failure injection
    procedure_failures: HashMap<String, u32>,
    failing_roles: HashSet<RoleName>,
}

impl MemoryState {
    fn account_mut(&mut self, id: &str) -> Option<&mut Account> {
        self.accounts
            .iter_mut()
            .map(|stored| &mut stored.account)
            .find(|account| account.id == id)
    }

    fn account_by_token(&self, token: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .map(|stored| &stored.account)
            .find(|account| account.session_token.as_deref() == Some(token))
    }

    fn add_account(&mut self, username: &str, password: &str, email: Option<String>) -> Account {
        let mut account = Account::new(uuid::Uuid::new_v4().simple().to_string(), username);
        account.email = email;
        account.member_index = Some(self.next_member_index);
        account.session_token = Some(uuid::Uuid::new_v4().to_string());
        account.created_at = Some(chrono::Utc::now());
        self.next_member_index += 1;

        self.accounts.push(StoredAccount {
            account: account.clone(),
            password: password.to_string(),
        });
        account
    }
}

/// Process-local data service
#[derive(Default)]
pub struct MemoryDataService {
    state: Mutex<MemoryState>,
}

impl MemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an account directly, bypassing sign-up
    pub fn insert_account(&self, username: &str, password: &str, verified: bool) -> Account {
        let mut state = self.state.lock();
        let mut account = state.add_account(username, password, None);
        account.verify = Some(verified);
        if let Some(stored) = state.account_mut(&account.id) {
            stored.verify = Some(verified);
        }
        account
    }

    pub fn account(&self, id: &str) -> Option<Account> {
        let state = self.state.lock();
        state
            .accounts
            .iter()
            .find(|stored| stored.account.id == id)
            .map(|stored| stored.account.clone())
    }

    pub fn account_by_username(&self, username: &str) -> Option<Account> {
        let state = self.state.lock();
        state
            .accounts
            .iter()
            .find(|stored| stored.account.username == username)
            .map(|stored| stored.account.clone())
    }

    pub fn role(&self, name: RoleName) -> Option<Role> {
        self.state.lock().roles.iter().find(|r| r.name == name).cloned()
    }

    pub fn role_members(&self, name: RoleName) -> BTreeSet<String> {
        self.role(name).map(|r| r.members).unwrap_or_default()
    }

    pub fn role_count(&self) -> usize {
        self.state.lock().roles.len()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.state.lock().groups.clone()
    }

    pub fn person_data(&self, id: &str) -> Option<Value> {
        self.state.lock().person_data.get(id).cloned()
    }

    /// Number of account listing queries served
    pub fn account_queries(&self) -> usize {
        self.state.lock().account_queries
    }

    /// Number of role membership updates written
    pub fn role_membership_writes(&self) -> usize {
        self.state.lock().role_membership_writes
    }

    /// Number of times the named function was invoked, failures included
    pub fn procedure_calls(&self, name: &str) -> u32 {
        self.state
            .lock()
            .procedure_calls
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Make the next `times` invocations of `name` fail
    pub fn fail_procedure(&self, name: &str, times: u32) {
        self.state
            .lock()
            .procedure_failures
            .insert(name.to_string(), times);
    }

    /// Make creation of the named role fail
    pub fn fail_role_creation(&self, name: RoleName) {
        self.state.lock().failing_roles.insert(name);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.procedure_failures.clear();
        state.failing_roles.clear();
    }

    fn run_builtin(state: &mut MemoryState, name: &str, params: &Value) -> Result<Value> {
        let target = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::Api {
                    status: 400,
                    code: 1,
                    message: format!("{} requires '{}'", name, key),
                })
        };

        match name {
            "userSignUp" => Ok(Value::String("ok".to_string())),
            "verifyUser" => {
                let id = target("targetUser")?;
                let account = state.account_mut(&id).ok_or_else(|| no_such_user(&id))?;
                account.verify = Some(true);
                Ok(Value::String("ok".to_string()))
            }
            "deleteUser" => {
                let id = target("targetUser")?;
                // Deleting twice is a no-op
                state.accounts.retain(|stored| stored.account.id != id);
                for role in state.roles.iter_mut() {
                    role.members.remove(&id);
                }
                Ok(Value::String("ok".to_string()))
            }
            "savePersonData" => {
                let id = target("id")?;
                let data = params.get("data").cloned().unwrap_or(Value::Null);
                state.person_data.insert(id, data);
                Ok(Value::String("ok".to_string()))
            }
            other => Err(Error::Api {
                status: 404,
                code: 1,
                message: format!("Cloud function not found: {}", other),
            }),
        }
    }
}

fn no_such_user(id: &str) -> Error {
    Error::Api {
        status: 404,
        code: 211,
        message: format!("Could not find user: {}", id),
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Account> {
        let mut state = self.state.lock();

        if state
            .accounts
            .iter()
            .any(|stored| stored.account.username == request.username)
        {
            return Err(Error::Api {
                status: 400,
                code: 202,
                message: "Username has already been taken.".to_string(),
            });
        }

        let mut account = state.add_account(&request.username, &request.password, request.email.clone());
        account.group_index = request.group_index;
        account.group_name = request.group_name.clone();
        if let Some(stored) = state.account_mut(&account.id) {
            stored.group_index = account.group_index;
            stored.group_name = account.group_name.clone();
        }

        state.current = Some(account.id.clone());
        Ok(account)
    }

    async fn log_in(&self, username: &str, password: &str) -> Result<Account> {
        let mut state = self.state.lock();

        let account = state
            .accounts
            .iter()
            .find(|stored| stored.account.username == username && stored.password == password)
            .map(|stored| stored.account.clone())
            .ok_or_else(|| Error::Api {
                status: 400,
                code: 210,
                message: "The username and password mismatch.".to_string(),
            })?;

        state.current = Some(account.id.clone());
        Ok(account)
    }

    async fn become_session(&self, session_token: &str) -> Result<Account> {
        let mut state = self.state.lock();

        let account = state
            .account_by_token(session_token)
            .cloned()
            .ok_or_else(|| Error::Api {
                status: 400,
                code: 211,
                message: "Could not find user.".to_string(),
            })?;

        state.current = Some(account.id.clone());
        Ok(account)
    }

    fn current_account(&self) -> Option<Account> {
        let state = self.state.lock();
        let id = state.current.as_deref()?;
        state
            .accounts
            .iter()
            .find(|stored| stored.account.id == id)
            .map(|stored| stored.account.clone())
    }

    async fn log_out(&self) -> Result<()> {
        self.state.lock().current = None;
        Ok(())
    }

    async fn find_accounts_by_username(&self, username: &str) -> Result<Vec<Account>> {
        let state = self.state.lock();
        Ok(state
            .accounts
            .iter()
            .filter(|stored| stored.account.username == username)
            .map(|stored| stored.account.clone())
            .collect())
    }

    async fn count_accounts(&self) -> Result<u64> {
        Ok(self.state.lock().accounts.len() as u64)
    }

    async fn query_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>> {
        let mut state = self.state.lock();
        state.account_queries += 1;

        let mut accounts: Vec<Account> = state
            .accounts
            .iter()
            .map(|stored| stored.account.clone())
            .filter(|account| !query.verified_only || account.is_verified())
            .collect();
        accounts.sort_by_key(|account| account.member_index.unwrap_or(i64::MAX));

        Ok(accounts)
    }

    async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<()> {
        let mut state = self.state.lock();
        let account = state
            .account_mut(account_id)
            .ok_or_else(|| no_such_user(account_id))?;
        patch.apply_to(account);
        Ok(())
    }

    async fn find_roles(&self, query: &RoleQuery) -> Result<Vec<Role>> {
        let state = self.state.lock();
        Ok(state
            .roles
            .iter()
            .filter(|role| role.name == query.name)
            .filter(|role| match query.member {
                Some(ref member) => role.members.contains(member),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn create_role(&self, role: &NewRole) -> Result<Role> {
        let mut state = self.state.lock();

        if state.failing_roles.contains(&role.name) {
            return Err(Error::persistence(format!(
                "injected failure creating role {}",
                role.name
            )));
        }
        if state.roles.iter().any(|existing| existing.name == role.name) {
            return Err(Error::Api {
                status: 400,
                code: 137,
                message: format!("A unique field was given a value that is already taken: {}", role.name),
            });
        }

        let created = Role {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: role.name,
            acl: role.acl.clone(),
            members: role.members.iter().cloned().collect(),
        };
        state.roles.push(created.clone());
        Ok(created)
    }

    async fn update_role_membership(
        &self,
        role_id: &str,
        change: MembershipChange,
        account_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let role = state
            .roles
            .iter_mut()
            .find(|role| role.id == role_id)
            .ok_or_else(|| Error::persistence(format!("role {} does not exist", role_id)))?;

        match change {
            MembershipChange::Add => role.members.insert(account_id.to_string()),
            MembershipChange::Remove => role.members.remove(account_id),
        };
        state.role_membership_writes += 1;
        Ok(())
    }

    async fn find_groups(&self) -> Result<Vec<Group>> {
        let mut groups = self.state.lock().groups.clone();
        groups.sort_by_key(|group| group.index);
        Ok(groups)
    }

    async fn create_group(&self, group: &Group) -> Result<()> {
        let mut state = self.state.lock();
        state.groups.push(group.clone());
        state.groups.sort_by_key(|group| group.index);
        Ok(())
    }

    async fn run_function(&self, name: &str, params: Value) -> Result<Value> {
        let mut state = self.state.lock();
        *state.procedure_calls.entry(name.to_string()).or_insert(0) += 1;

        if let Some(remaining) = state.procedure_failures.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Http(format!("injected failure calling {}", name)));
            }
        }

        Self::run_builtin(&mut state, name, &params)
    }
}
