//! External-intelligence seams.
//!
//! Breach data, social discovery and messenger presence are external
//! collaborators. The traits below are the only surface the handlers know
//! about; the simulated implementations in this file are deterministic
//! stand-ins wired up by default and used by the tests. A real provider
//! integration implements the same trait and swaps in at startup.

use crate::models::{BreachRecord, MessengerPresence, SocialProfile};
use crate::osint::email::avatar_hash;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait BreachIntel: Send + Sync {
    async fn breaches_for(&self, email: &str) -> Vec<BreachRecord>;
}

#[async_trait]
pub trait SocialIntel: Send + Sync {
    /// `deep_scan` widens the platform catalog slice that gets checked.
    async fn profiles_for(&self, email: &str, username: &str, deep_scan: bool)
        -> Vec<SocialProfile>;
}

#[async_trait]
pub trait PresenceIntel: Send + Sync {
    async fn messengers_for(&self, e164: &str) -> MessengerPresence;
}

#[derive(Clone)]
pub struct IntelSuite {
    pub breach: Arc<dyn BreachIntel>,
    pub social: Arc<dyn SocialIntel>,
    pub presence: Arc<dyn PresenceIntel>,
}

impl IntelSuite {
    pub fn simulated() -> Self {
        Self {
            breach: Arc::new(SimulatedBreachIntel),
            social: Arc::new(SimulatedSocialIntel::default()),
            presence: Arc::new(SimulatedPresenceIntel),
        }
    }
}

/// Deterministic breach stand-in: addresses containing "test" or "demo" get a
/// fixed three-breach history, everything else is clean.
pub struct SimulatedBreachIntel;

#[async_trait]
impl BreachIntel for SimulatedBreachIntel {
    async fn breaches_for(&self, email: &str) -> Vec<BreachRecord> {
        let lowered = email.to_lowercase();
        if !lowered.contains("test") && !lowered.contains("demo") {
            return Vec::new();
        }
        vec![
            BreachRecord {
                name: "LinkedIn".to_string(),
                domain: "linkedin.com".to_string(),
                date: "2021-06-22".to_string(),
                data_types: vec!["emails".to_string(), "passwords".to_string()],
            },
            BreachRecord {
                name: "Adobe".to_string(),
                domain: "adobe.com".to_string(),
                date: "2013-10-04".to_string(),
                data_types: vec![
                    "emails".to_string(),
                    "password hints".to_string(),
                    "passwords".to_string(),
                ],
            },
            BreachRecord {
                name: "Dropbox".to_string(),
                domain: "dropbox.com".to_string(),
                date: "2012-07-01".to_string(),
                data_types: vec!["emails".to_string(), "passwords".to_string()],
            },
        ]
    }
}

struct PlatformEntry {
    name: &'static str,
    category: &'static str,
    profile_template: &'static str,
}

const PLATFORM_CATALOG: &[PlatformEntry] = &[
    PlatformEntry { name: "GitHub", category: "development", profile_template: "https://github.com/{username}" },
    PlatformEntry { name: "Twitter/X", category: "social", profile_template: "https://twitter.com/{username}" },
    PlatformEntry { name: "Instagram", category: "social", profile_template: "https://www.instagram.com/{username}/" },
    PlatformEntry { name: "LinkedIn", category: "professional", profile_template: "https://www.linkedin.com/in/{username}" },
    PlatformEntry { name: "Facebook", category: "social", profile_template: "https://www.facebook.com/{username}" },
    PlatformEntry { name: "GitLab", category: "development", profile_template: "https://gitlab.com/{username}" },
    PlatformEntry { name: "Reddit", category: "social", profile_template: "https://www.reddit.com/user/{username}" },
    PlatformEntry { name: "Pinterest", category: "social", profile_template: "https://www.pinterest.com/{username}/" },
    PlatformEntry { name: "Medium", category: "publishing", profile_template: "https://medium.com/@{username}" },
    PlatformEntry { name: "Spotify", category: "music", profile_template: "https://open.spotify.com/user/{username}" },
    PlatformEntry { name: "TikTok", category: "social", profile_template: "https://www.tiktok.com/@{username}" },
    PlatformEntry { name: "YouTube", category: "video", profile_template: "https://www.youtube.com/@{username}" },
];

/// Deterministic social stand-in over a static platform catalog. Existence is
/// a stable function of (email, platform) so repeat scans agree.
pub struct SimulatedSocialIntel {
    quick_sites: usize,
}

impl Default for SimulatedSocialIntel {
    fn default() -> Self {
        Self { quick_sites: 6 }
    }
}

impl SimulatedSocialIntel {
    fn simulated_hit(email: &str, platform: &str) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(email.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(platform.as_bytes());
        hasher.finalize()[0] % 3 == 0
    }
}

#[async_trait]
impl SocialIntel for SimulatedSocialIntel {
    async fn profiles_for(
        &self,
        email: &str,
        username: &str,
        deep_scan: bool,
    ) -> Vec<SocialProfile> {
        let slice = if deep_scan {
            PLATFORM_CATALOG
        } else {
            &PLATFORM_CATALOG[..self.quick_sites.min(PLATFORM_CATALOG.len())]
        };
        slice
            .iter()
            .map(|entry| SocialProfile {
                platform: entry.name.to_string(),
                url: entry.profile_template.replace("{username}", username),
                username: Some(username.to_string()),
                exists: Self::simulated_hit(email, entry.name),
                category: entry.category.to_string(),
            })
            .collect()
    }
}

/// Deterministic messenger stand-in keyed off the last digit of the E.164
/// form: even digits "have" WhatsApp, multiples of three "have" Telegram.
pub struct SimulatedPresenceIntel;

#[async_trait]
impl PresenceIntel for SimulatedPresenceIntel {
    async fn messengers_for(&self, e164: &str) -> MessengerPresence {
        let last_digit = e164
            .chars()
            .rev()
            .find(char::is_ascii_digit)
            .and_then(|c| c.to_digit(10));
        match last_digit {
            Some(d) => MessengerPresence {
                whatsapp: d % 2 == 0,
                telegram: d % 3 == 0,
            },
            None => MessengerPresence::default(),
        }
    }
}

/// HEAD-probe against an avatar service's existence endpoint (`?d=404`).
/// Failures of any kind mean "no avatar"; the probe never surfaces an error.
#[derive(Clone)]
pub struct AvatarProbe {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AvatarProbe {
    pub fn new(client: reqwest::Client, base_url: String, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn existence_url(&self, email: &str) -> String {
        format!("{}/avatar/{}?d=404", self.base_url, avatar_hash(email))
    }

    pub fn avatar_url(&self, email: &str) -> String {
        format!("{}/avatar/{}", self.base_url, avatar_hash(email))
    }

    pub async fn probe(&self, email: &str) -> Option<String> {
        let url = self.existence_url(email);
        match self
            .client
            .head(&url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => Some(self.avatar_url(email)),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "avatar probe failed");
                None
            }
        }
    }
}
