use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Form tokens whose submission is still being processed.
#[derive(Debug, Default)]
pub struct InFlight {
    tokens: Mutex<HashSet<String>>,
}

impl InFlight {
    /// Mark `token` busy until the returned guard drops. `None` if a
    /// submission with the same token is already running.
    pub fn claim(&self, token: &str) -> Option<InFlightGuard<'_>> {
        if !self.lock().insert(token.to_owned()) {
            return None;
        }
        Some(InFlightGuard {
            owner: self,
            token: token.to_owned(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    token: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.token);
    }
}
