//! Email format and domain checks. All functions here are pure; network
//! probes live behind the capability seams in `intel`.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // One conservative pattern: printable local part, dotted domain, alpha TLD.
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex")
    })
}

pub fn is_valid_format(email: &str) -> bool {
    email_re().is_match(email)
}

const DISPOSABLE_DOMAINS: &[&str] = &[
    "tempmail.com",
    "throwaway.com",
    "guerrillamail.com",
    "mailinator.com",
    "10minutemail.com",
    "yopmail.com",
    "trashmail.com",
    "fakeinbox.com",
    "tempail.com",
    "dispostable.com",
    "getnada.com",
    "temp-mail.org",
];

const FREE_PROVIDERS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "icloud.com",
    "mail.com",
    "proton.me",
    "protonmail.com",
    "yandex.com",
    "gmx.com",
];

pub fn domain_of(email: &str) -> Option<String> {
    email
        .split('@')
        .nth(1)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_lowercase)
}

/// Substring-tolerant denylist check, so "mail.tempmail.com" is caught too.
pub fn is_disposable(email: &str) -> bool {
    match domain_of(email) {
        Some(domain) => DISPOSABLE_DOMAINS.iter().any(|d| domain.contains(d)),
        None => false,
    }
}

pub fn is_free_provider(email: &str) -> bool {
    match domain_of(email) {
        Some(domain) => FREE_PROVIDERS.iter().any(|d| domain == *d),
        None => false,
    }
}

/// Content hash of the canonical (trimmed, lowercased) address, used as the
/// avatar-service identifier.
pub fn avatar_hash(email: &str) -> String {
    let canonical = email.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn local_part(email: &str) -> String {
    email
        .split('@')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}
