//! Cache of the identities behind `/auth/me`.
//!
//! An entry is served while younger than the TTL. A stale entry triggers a
//! refresh; if the identity collaborator fails, the stale entry is served
//! instead. Without any entry the collaborator's error is returned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use log::warn;

use super::ports::{Clock, IdentityProvider};
use crate::error::{CoreError, CoreResult};
use crate::models::Identity;

#[derive(Debug, Clone)]
struct CachedIdentity {
    identity: Identity,
    fetched_at: DateTime<Utc>,
}

pub struct SessionCache<I> {
    provider: Arc<I>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedIdentity>>,
}

impl<I: IdentityProvider> SessionCache<I> {
    pub fn new(provider: Arc<I>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        SessionCache {
            provider,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Identity of `account_id`, or `None` when the account no longer exists.
    pub async fn current(&self, account_id: &str) -> CoreResult<Option<Identity>> {
        let now = self.clock.now();
        let cached = self.lookup(account_id)?;

        if let Some(entry) = &cached {
            if now - entry.fetched_at < self.ttl {
                return Ok(Some(entry.identity.clone()));
            }
        }

        match self.provider.current_user(account_id).await {
            Ok(Some(identity)) => {
                self.store(CachedIdentity {
                    identity: identity.clone(),
                    fetched_at: now,
                })?;
                Ok(Some(identity))
            }
            Ok(None) => {
                self.invalidate(account_id);
                Ok(None)
            }
            Err(e) => match cached {
                Some(stale) => {
                    warn!("Identity refresh for {} failed, serving cached entry: {}", account_id, e);
                    Ok(Some(stale.identity))
                }
                None => Err(e),
            },
        }
    }

    pub fn invalidate(&self, account_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(account_id);
        }
    }

    fn lookup(&self, account_id: &str) -> CoreResult<Option<CachedIdentity>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CoreError::transient("Session cache is unavailable"))?;
        Ok(entries.get(account_id).cloned())
    }

    fn store(&self, entry: CachedIdentity) -> CoreResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CoreError::transient("Session cache is unavailable"))?;
        entries.insert(entry.identity.id.clone(), entry);
        Ok(())
    }
}
