//! Account Listing Cache
//!
//! One cache slot holding the most recent account listing as a shared
//! future. Callers asking for the cached listing all await the same fetch
//! and receive the same `Arc`.
//!
//! The slot is not keyed by the filter: while `use_cache` is true, a call
//! returns whatever listing populated the slot, even if it was fetched with
//! a different `include_unverified`. There is no expiry; only a call with
//! `use_cache = false` or [`AccountCache::invalidate`] replaces it.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Account;
use crate::service::{AccountQuery, DataService};

/// A listing that can be awaited by any number of callers
pub type AccountListing = Shared<BoxFuture<'static, Result<Arc<Vec<Account>>>>>;

pub struct AccountCache {
    service: Arc<dyn DataService>,
    slot: Mutex<Option<AccountListing>>,
}

impl AccountCache {
    pub fn new(service: Arc<dyn DataService>) -> Self {
        Self {
            service,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached listing, or start a fresh fetch and cache it when
    /// the slot is empty or `use_cache` is false.
    pub fn get(&self, use_cache: bool, include_unverified: bool) -> AccountListing {
        let mut slot = self.slot.lock();

        if use_cache {
            if let Some(listing) = slot.as_ref() {
                return listing.clone();
            }
        }

        debug!(include_unverified, "Fetching account listing");
        let listing = self.fetch(include_unverified);
        *slot = Some(listing.clone());
        listing
    }

    /// Accounts ascending by `memberIndex`; unverified accounts only when
    /// asked for.
    pub async fn list_accounts(
        &self,
        use_cache: bool,
        include_unverified: bool,
    ) -> Result<Arc<Vec<Account>>> {
        self.get(use_cache, include_unverified).await
    }

    /// Drop the cached listing
    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }

    pub fn is_populated(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn fetch(&self, include_unverified: bool) -> AccountListing {
        let service = Arc::clone(&self.service);
        let query = AccountQuery {
            verified_only: !include_unverified,
        };

        async move {
            let accounts = service.query_accounts(&query).await?;
            Ok::<_, Error>(Arc::new(accounts))
        }
        .boxed()
        .shared()
    }
}
