//! Domain Model
//!
//! Accounts, roles and groups as stored by the remote data service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use rk_config::GroupConfig;

use crate::error::{Error, Result};
use crate::policy::AccessControlPolicy;

/// An end-user identity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "objectId")]
    pub id: String,

    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Set by an administrator; only `Some(true)` counts as verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<bool>,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    /// Ordering key for account listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_index: Option<i64>,

    #[serde(rename = "ACL", default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<AccessControlPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            verify: None,
            is_admin: false,
            group_index: None,
            group_name: None,
            member_index: None,
            acl: None,
            session_token: None,
            created_at: None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verify == Some(true)
    }

    /// Whether the account carries its provisioned access policy
    pub fn is_provisioned(&self) -> bool {
        self.acl
            .as_ref()
            .is_some_and(|acl| acl.satisfies_account_invariant(&self.id))
    }
}

/// Partial update of an account. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_index: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    #[serde(rename = "ACL", skip_serializing_if = "Option::is_none")]
    pub acl: Option<AccessControlPolicy>,
}

impl AccountPatch {
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = Some(is_admin);
        self
    }

    pub fn with_group(mut self, group: &Group) -> Self {
        self.group_index = Some(group.index);
        self.group_name = Some(group.name.clone());
        self
    }

    pub fn with_acl(mut self, acl: AccessControlPolicy) -> Self {
        self.acl = Some(acl);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Mirror the patch onto a local copy of the account
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(is_admin) = self.is_admin {
            account.is_admin = is_admin;
        }
        if let Some(index) = self.group_index {
            account.group_index = Some(index);
        }
        if let Some(ref name) = self.group_name {
            account.group_name = Some(name.clone());
        }
        if let Some(ref acl) = self.acl {
            account.acl = Some(acl.clone());
        }
    }
}

/// Input for creating a new account
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    /// Optional group pre-selected by the user
    pub group_index: Option<u32>,
    pub group_name: Option<String>,
}

impl SignUpRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: None,
            group_index: None,
            group_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_group(mut self, group: &Group) -> Self {
        self.group_index = Some(group.index);
        self.group_name = Some(group.name.clone());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::Validation("Username is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::Validation("Password is required".to_string()));
        }
        Ok(())
    }
}

/// The two roles the application knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    Administrator,
    Normal,
}

impl RoleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Administrator => "administrator",
            RoleName::Normal => "normal",
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoleName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "administrator" => Ok(RoleName::Administrator),
            "normal" => Ok(RoleName::Normal),
            other => Err(Error::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// A persisted role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "objectId")]
    pub id: String,

    pub name: RoleName,

    #[serde(rename = "ACL", default)]
    pub acl: AccessControlPolicy,

    /// Member account ids, when the backing store returns them
    #[serde(skip)]
    pub members: BTreeSet<String>,
}

/// A role about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewRole {
    pub name: RoleName,
    pub acl: AccessControlPolicy,
    pub members: Vec<String>,
}

impl NewRole {
    pub fn new(name: RoleName) -> Self {
        Self {
            name,
            acl: AccessControlPolicy::for_role(name),
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, account_id: impl Into<String>) -> Self {
        self.members.push(account_id.into());
        self
    }
}

/// A team group, seeded once from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub index: u32,
    pub name: String,
}

impl Group {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl From<&GroupConfig> for Group {
    fn from(config: &GroupConfig) -> Self {
        Self::new(config.index, config.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_from_wire() {
        let account: Account = serde_json::from_value(json!({
            "objectId": "u1",
            "username": "alice",
            "verify": true,
            "isAdmin": true,
            "groupIndex": 0,
            "groupName": "Core",
            "memberIndex": 3,
            "createdAt": "2024-06-29T01:39:35.931Z",
            "emailVerified": false
        }))
        .unwrap();

        assert!(account.is_verified());
        assert!(account.is_admin);
        assert_eq!(account.group_name.as_deref(), Some("Core"));
        assert_eq!(account.member_index, Some(3));
        assert!(!account.is_provisioned());
    }

    #[test]
    fn test_verify_must_be_exactly_true() {
        let mut account = Account::new("u1", "alice");
        assert!(!account.is_verified());
        account.verify = Some(false);
        assert!(!account.is_verified());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = AccountPatch::default().with_group(&Group::new(1, "Ops"));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "groupIndex": 1, "groupName": "Ops" })
        );
        assert!(AccountPatch::default().is_empty());
    }

    #[test]
    fn test_patch_apply() {
        let mut account = Account::new("u1", "alice");
        AccountPatch::default()
            .with_admin(true)
            .with_acl(AccessControlPolicy::for_account("u1"))
            .apply_to(&mut account);

        assert!(account.is_admin);
        assert!(account.is_provisioned());
        assert_eq!(account.group_index, None);
    }

    #[test]
    fn test_sign_up_validation() {
        assert!(SignUpRequest::new("alice", "pw").validate().is_ok());
        assert!(SignUpRequest::new(" ", "pw").validate().is_err());
        assert!(SignUpRequest::new("alice", "").validate().is_err());
        // Email format is checked by the remote service
        assert!(SignUpRequest::new("alice", "pw")
            .with_email("not-an-email")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_role_name_round_trip() {
        assert_eq!("normal".parse::<RoleName>().unwrap(), RoleName::Normal);
        assert!("guest".parse::<RoleName>().is_err());
        assert_eq!(
            serde_json::to_value(RoleName::Administrator).unwrap(),
            json!("administrator")
        );
    }
}
