//! Trust-on-first-use host key handling.

use kmcx_core::config::{load_config_from, save_config_to};
use kmcx_core::errors::ConfigError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Accept,
    Reject,
}

/// Asks the user whether to trust an unknown or changed host key.
pub trait TrustPrompt: Send + Sync {
    /// `previous` is the pinned fingerprint when the key has changed.
    fn confirm(&self, host: &str, port: u16, fingerprint: &str, previous: Option<&str>) -> TrustDecision;
}

/// Persists accepted fingerprints.
pub trait FingerprintStore: Send + Sync {
    fn save(&self, profile: &str, fingerprint: &str) -> Result<(), ConfigError>;
}

/// Writes fingerprints back into the profile's configuration file.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FingerprintStore for ProfileStore {
    fn save(&self, profile: &str, fingerprint: &str) -> Result<(), ConfigError> {
        let mut config = load_config_from(&self.path)?;
        config.pin_fingerprint(profile, fingerprint)?;
        save_config_to(&config, &self.path)
    }
}

/// Accepts every key without asking. Used by `--accept-new-host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl TrustPrompt for AcceptAll {
    fn confirm(&self, _: &str, _: u16, _: &str, previous: Option<&str>) -> TrustDecision {
        if previous.is_some() {
            TrustDecision::Reject
        } else {
            TrustDecision::Accept
        }
    }
}

/// Per-batch host key decision state. Shared by the command and transfer
/// connections so the user is asked at most once per batch.
pub struct HostKeyPolicy {
    profile: String,
    pinned: Mutex<Option<String>>,
    rejected: Mutex<Option<String>>,
    prompt: Arc<dyn TrustPrompt>,
    store: Option<Arc<dyn FingerprintStore>>,
}

impl std::fmt::Debug for HostKeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostKeyPolicy")
            .field("profile", &self.profile)
            .field("pinned", &self.pinned())
            .field("rejected", &self.rejected_fingerprint())
            .finish()
    }
}

impl HostKeyPolicy {
    pub fn new(
        profile: impl Into<String>,
        pinned: Option<String>,
        prompt: Arc<dyn TrustPrompt>,
        store: Option<Arc<dyn FingerprintStore>>,
    ) -> Self {
        Self {
            profile: profile.into(),
            pinned: Mutex::new(pinned),
            rejected: Mutex::new(None),
            prompt,
            store,
        }
    }

    pub fn pinned(&self) -> Option<String> {
        self.pinned.lock().ok().and_then(|g| g.clone())
    }

    /// Fingerprint the user refused during this batch, if any.
    pub fn rejected_fingerprint(&self) -> Option<String> {
        self.rejected.lock().ok().and_then(|g| g.clone())
    }

    /// Decides whether the server presenting `fingerprint` is trusted.
    pub fn check(&self, host: &str, port: u16, fingerprint: &str) -> bool {
        let Ok(mut pinned) = self.pinned.lock() else {
            return false;
        };
        if pinned.as_deref() == Some(fingerprint) {
            return true;
        }

        let previous = pinned.clone();
        if previous.is_some() {
            tracing::warn!(
                "Host key for {}:{} changed (was {}, now {})",
                host,
                port,
                previous.as_deref().unwrap_or_default(),
                fingerprint
            );
        }

        match self.prompt.confirm(host, port, fingerprint, previous.as_deref()) {
            TrustDecision::Accept => {
                *pinned = Some(fingerprint.to_string());
                if let Some(store) = &self.store {
                    if let Err(e) = store.save(&self.profile, fingerprint) {
                        tracing::warn!("Could not persist host fingerprint: {}", e);
                    }
                }
                tracing::info!("Trusted host key {} for {}:{}", fingerprint, host, port);
                true
            }
            TrustDecision::Reject => {
                if let Ok(mut rejected) = self.rejected.lock() {
                    *rejected = Some(fingerprint.to_string());
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        answer: TrustDecision,
    }

    impl TrustPrompt for Counting {
        fn confirm(&self, _: &str, _: u16, _: &str, _: Option<&str>) -> TrustDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn counting(answer: TrustDecision) -> Arc<Counting> {
        Arc::new(Counting {
            calls: AtomicUsize::new(0),
            answer,
        })
    }

    #[test]
    fn test_pinned_key_is_silent() {
        let prompt = counting(TrustDecision::Reject);
        let policy = HostKeyPolicy::new("c", Some("SHA256:abc".into()), prompt.clone(), None);
        assert!(policy.check("h", 22, "SHA256:abc"));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_accepted_once_per_batch() {
        let prompt = counting(TrustDecision::Accept);
        let policy = HostKeyPolicy::new("c", None, prompt.clone(), None);
        assert!(policy.check("h", 22, "SHA256:new"));
        assert!(policy.check("h", 22, "SHA256:new"));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
        assert_eq!(policy.pinned().as_deref(), Some("SHA256:new"));
    }

    #[test]
    fn test_rejection_is_recorded() {
        let prompt = counting(TrustDecision::Reject);
        let policy = HostKeyPolicy::new("c", Some("SHA256:old".into()), prompt, None);
        assert!(!policy.check("h", 22, "SHA256:other"));
        assert_eq!(policy.rejected_fingerprint().as_deref(), Some("SHA256:other"));
        assert_eq!(policy.pinned().as_deref(), Some("SHA256:old"));
    }

    #[test]
    fn test_accept_all_refuses_changed_keys() {
        assert_eq!(AcceptAll.confirm("h", 22, "x", None), TrustDecision::Accept);
        assert_eq!(AcceptAll.confirm("h", 22, "x", Some("y")), TrustDecision::Reject);
    }
}
