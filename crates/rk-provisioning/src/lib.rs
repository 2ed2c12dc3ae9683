//! # RosterKit Provisioning
//!
//! Client-side account provisioning over a remote data service: the
//! verification gate in front of log-in, role and group bootstrap for the
//! first account, membership for everyone after it, per-account access
//! control, retried server procedures and a shared account listing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rk_config::AppConfig;
//! use rk_provisioning::{Provisioning, SignUpRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let provisioning = Provisioning::from_config(&config)?;
//!
//!     let account = provisioning
//!         .sign_up(SignUpRequest::new("alice", "secret").with_email("alice@example.com"))
//!         .await?;
//!     println!("Signed up {} (admin: {})", account.username, account.is_admin);
//!
//!     Ok(())
//! }
//! ```
//!
//! Everything talks to the remote side through the [`DataService`] trait.
//! [`RestDataService`] is the HTTP implementation, [`MemoryDataService`]
//! keeps everything in process for tests and local runs.

pub mod acl;
pub mod bootstrap;
pub mod cache;
pub mod error;
pub mod facade;
pub mod memory;
pub mod model;
pub mod policy;
pub mod procedure;
pub mod rest;
pub mod retry;
pub mod role;
pub mod service;
pub mod verification;

// Re-export main types
pub use error::{Error, Result};
pub use facade::{Provisioning, ProvisioningSettings};
pub use memory::MemoryDataService;
pub use model::{Account, AccountPatch, Group, NewRole, Role, RoleName, SignUpRequest};
pub use policy::{Access, AccessControlPolicy, Grantee};
pub use rest::RestDataService;
pub use retry::RetryPolicy;
pub use service::{AccountQuery, DataService, MembershipChange, RoleQuery};
