//! Access-Control Policies
//!
//! A policy maps grantees (the public, a single account, or a role) to
//! read/write flags. On the wire it is the object
//! `{ "*": {...}, "<accountId>": {...}, "role:<name>": {...} }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::RoleName;

const PUBLIC_KEY: &str = "*";
const ROLE_PREFIX: &str = "role:";

/// Who a policy entry applies to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grantee {
    Public,
    Account(String),
    Role(String),
}

impl Grantee {
    pub fn account(id: impl Into<String>) -> Self {
        Self::Account(id.into())
    }

    pub fn role(name: RoleName) -> Self {
        Self::Role(name.as_str().to_string())
    }

    fn key(&self) -> String {
        match self {
            Grantee::Public => PUBLIC_KEY.to_string(),
            Grantee::Account(id) => id.clone(),
            Grantee::Role(name) => format!("{}{}", ROLE_PREFIX, name),
        }
    }

    fn from_key(key: &str) -> Self {
        if key == PUBLIC_KEY {
            Grantee::Public
        } else if let Some(name) = key.strip_prefix(ROLE_PREFIX) {
            Grantee::Role(name.to_string())
        } else {
            Grantee::Account(key.to_string())
        }
    }
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Read/write flags for one grantee
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    #[serde(default, skip_serializing_if = "is_false")]
    pub read: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub write: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Access-control policy attached to accounts and roles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, Access>",
    from = "BTreeMap<String, Access>"
)]
pub struct AccessControlPolicy {
    entries: BTreeMap<Grantee, Access>,
}

impl AccessControlPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The policy every provisioned account carries: anyone may read, only
    /// the account itself and administrators may write.
    pub fn for_account(account_id: &str) -> Self {
        let mut policy = Self::new();
        policy.set_public_read(true);
        policy.set_public_write(false);
        policy.set_write(Grantee::account(account_id), true);
        policy.set_write(Grantee::role(RoleName::Administrator), true);
        policy
    }

    /// The policy a role is created with. Public write is only opened for
    /// the `normal` role.
    pub fn for_role(name: RoleName) -> Self {
        let mut policy = Self::new();
        policy.set_public_read(true);
        policy.set_public_write(name == RoleName::Normal);
        policy.set_read(Grantee::role(name), true);
        policy.set_write(Grantee::role(name), true);
        policy
    }

    pub fn set_public_read(&mut self, allowed: bool) {
        self.set_read(Grantee::Public, allowed);
    }

    pub fn set_public_write(&mut self, allowed: bool) {
        self.set_write(Grantee::Public, allowed);
    }

    pub fn set_read(&mut self, grantee: Grantee, allowed: bool) {
        self.entries.entry(grantee).or_default().read = allowed;
    }

    pub fn set_write(&mut self, grantee: Grantee, allowed: bool) {
        self.entries.entry(grantee).or_default().write = allowed;
    }

    pub fn access(&self, grantee: &Grantee) -> Access {
        self.entries.get(grantee).copied().unwrap_or_default()
    }

    pub fn public_read(&self) -> bool {
        self.access(&Grantee::Public).read
    }

    pub fn public_write(&self) -> bool {
        self.access(&Grantee::Public).write
    }

    pub fn can_read(&self, grantee: &Grantee) -> bool {
        self.public_read() || self.access(grantee).read
    }

    pub fn can_write(&self, grantee: &Grantee) -> bool {
        self.public_write() || self.access(grantee).write
    }

    /// Whether this policy grants what every provisioned account must grant
    pub fn satisfies_account_invariant(&self, account_id: &str) -> bool {
        self.public_read()
            && !self.public_write()
            && self.access(&Grantee::account(account_id)).write
            && self.access(&Grantee::role(RoleName::Administrator)).write
    }

    pub fn grantees(&self) -> impl Iterator<Item = &Grantee> {
        self.entries.keys()
    }
}

impl From<AccessControlPolicy> for BTreeMap<String, Access> {
    fn from(policy: AccessControlPolicy) -> Self {
        policy
            .entries
            .into_iter()
            .filter(|(_, access)| access.read || access.write)
            .map(|(grantee, access)| (grantee.key(), access))
            .collect()
    }
}

impl From<BTreeMap<String, Access>> for AccessControlPolicy {
    fn from(map: BTreeMap<String, Access>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, access)| (Grantee::from_key(&key), access))
                .collect(),
        }
    }
}
