//! Mirror host normalization.
//!
//! Listings may link resources on any of several interchangeable mirror hosts.
//! [`DomainNormalizer`] rewrites every such locator onto one canonical host so
//! all downloads hit the origin the session is using. Locators outside the
//! mirror set pass through byte-identical.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Interchangeable archive hosts the listing is served from.
pub const DEFAULT_MIRROR_HOSTS: &[&str] = &[
    "stake.us",
    "stake.com",
    "stake.ac",
    "stake.games",
    "stake.bet",
    "stake.pet",
    "stake1001.com",
    "stake1002.com",
    "stake1003.com",
    "stake1021.com",
    "stake1022.com",
    "stake.mba",
    "stake.jp",
    "stake.bz",
    "staketr.com",
    "stake.ceo",
    "stake.krd",
];

/// Errors building a [`DomainNormalizer`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// No mirror hosts were supplied.
    #[error("mirror host set is empty")]
    EmptyMirrorSet,
}

/// Non-fatal problem reported while normalizing one locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeDiagnostic {
    /// The locator that could not be examined.
    pub locator: String,
    /// Parser message.
    pub reason: String,
}

impl fmt::Display for NormalizeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not parse {:?}: {}", self.locator, self.reason)
    }
}

/// Result of [`DomainNormalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// The locator to download from.
    pub locator: String,
    /// True when the host was rewritten.
    pub rewritten: bool,
    /// Set when the input could not be parsed and was returned unchanged.
    pub diagnostic: Option<NormalizeDiagnostic>,
}

/// Rewrites mirror hosts onto a single canonical host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainNormalizer {
    mirrors: Vec<String>,
    canonical: String,
}

impl DomainNormalizer {
    /// Builds a normalizer over `mirrors`.
    ///
    /// `canonical` is resolved to the mirror it belongs to (equal or subdomain);
    /// when absent or outside the set, the first mirror is canonical.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::EmptyMirrorSet`] when `mirrors` holds no usable host.
    pub fn new<I, S>(mirrors: I, canonical: Option<&str>) -> Result<Self, NormalizeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hosts: Vec<String> = Vec::new();
        for mirror in mirrors {
            let host = mirror.as_ref().trim().trim_end_matches('.').to_ascii_lowercase();
            if !host.is_empty() && !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        let first = hosts.first().cloned().ok_or(NormalizeError::EmptyMirrorSet)?;

        let canonical = match canonical {
            Some(host) => match mirror_match(&hosts, host) {
                Some(mirror) => mirror.to_string(),
                None => {
                    warn!(host, fallback = %first, "canonical host is not a known mirror");
                    first
                }
            },
            None => first,
        };

        Ok(Self {
            mirrors: hosts,
            canonical,
        })
    }

    /// Builds a normalizer whose canonical host is the mirror `current_host` belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::EmptyMirrorSet`] when `mirrors` holds no usable host.
    pub fn for_current_host<I, S>(current_host: &str, mirrors: I) -> Result<Self, NormalizeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(mirrors, Some(current_host))
    }

    /// Normalizer over [`DEFAULT_MIRROR_HOSTS`] with `stake.us` canonical.
    #[must_use]
    pub fn with_default_mirrors() -> Self {
        Self {
            mirrors: DEFAULT_MIRROR_HOSTS.iter().map(|h| (*h).to_string()).collect(),
            canonical: DEFAULT_MIRROR_HOSTS[0].to_string(),
        }
    }

    /// The host every mirror locator is rewritten to.
    #[must_use]
    pub fn canonical_host(&self) -> &str {
        &self.canonical
    }

    /// The known mirror hosts, lowercased.
    #[must_use]
    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    /// Returns the mirror `host` equals or is a subdomain of.
    #[must_use]
    pub fn mirror_for(&self, host: &str) -> Option<&str> {
        mirror_match(&self.mirrors, host)
    }

    /// Rewrites `locator` onto the canonical host when it points at a mirror.
    ///
    /// Never fails: unparseable input comes back unchanged with a diagnostic.
    pub fn normalize(&self, locator: &str) -> Normalized {
        let unchanged = |diagnostic| Normalized {
            locator: locator.to_string(),
            rewritten: false,
            diagnostic,
        };

        let mut url = match Url::parse(locator) {
            Ok(url) => url,
            Err(e) => {
                let diagnostic = NormalizeDiagnostic {
                    locator: locator.to_string(),
                    reason: e.to_string(),
                };
                debug!(%diagnostic, "locator left unchanged");
                return unchanged(Some(diagnostic));
            }
        };

        let Some(host) = url.host_str() else {
            return unchanged(None);
        };
        if host.eq_ignore_ascii_case(&self.canonical) || self.mirror_for(host).is_none() {
            return unchanged(None);
        }

        if let Err(e) = url.set_host(Some(self.canonical.as_str())) {
            let diagnostic = NormalizeDiagnostic {
                locator: locator.to_string(),
                reason: e.to_string(),
            };
            return unchanged(Some(diagnostic));
        }

        debug!(from = locator, to = %url, "locator host rewritten");
        Normalized {
            locator: url.into(),
            rewritten: true,
            diagnostic: None,
        }
    }
}

fn mirror_match<'a>(mirrors: &'a [String], host: &str) -> Option<&'a str> {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    mirrors
        .iter()
        .find(|m| {
            host == **m
                || host
                    .strip_suffix(m.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
        .map(String::as_str)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pair() -> DomainNormalizer {
        DomainNormalizer::new(["mirrorA.example", "mirrorB.example"], Some("mirrorB.example"))
            .unwrap()
    }

    #[test]
    fn test_normalize_rewrites_mirror_to_canonical() {
        let out = pair().normalize("https://mirrorA.example/_api/archive/1?x=2");
        assert_eq!(out.locator, "https://mirrorb.example/_api/archive/1?x=2");
        assert!(out.rewritten);
        assert!(out.diagnostic.is_none());
    }

    #[test]
    fn test_normalize_rewrites_subdomain_of_mirror() {
        let out = pair().normalize("https://cdn.mirrora.example/a");
        assert_eq!(out.locator, "https://mirrorb.example/a");
    }

    #[test]
    fn test_normalize_leaves_canonical_host_byte_identical() {
        let input = "https://MirrorB.example/_api/archive/%7E1";
        let out = pair().normalize(input);
        assert_eq!(out.locator, input);
        assert!(!out.rewritten);
    }

    #[test]
    fn test_normalize_leaves_foreign_host_byte_identical() {
        let input = "https://Other.example:8443/a b";
        let out = pair().normalize(input);
        assert_eq!(out.locator, input);
        assert!(!out.rewritten);
    }

    #[test]
    fn test_normalize_does_not_match_suffix_without_dot() {
        let input = "https://evilmirrora.example/a";
        assert_eq!(pair().normalize(input).locator, input);
    }

    #[test]
    fn test_normalize_unparseable_returns_original_with_diagnostic() {
        let out = pair().normalize("/_api/archive/1");
        assert_eq!(out.locator, "/_api/archive/1");
        assert!(out.diagnostic.is_some());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = pair();
        for input in [
            "https://mirrorA.example/_api/archive/1",
            "https://x.mirrorb.example/1",
            "https://other.example/1",
            "not a url",
            "https://mirrora.example",
        ] {
            let once = normalizer.normalize(input).locator;
            let twice = normalizer.normalize(&once).locator;
            assert_eq!(once, twice, "input {input}");
        }
    }

    #[test]
    fn test_new_rejects_empty_mirror_set() {
        let empty: [&str; 0] = [];
        assert_eq!(
            DomainNormalizer::new(empty, None),
            Err(NormalizeError::EmptyMirrorSet)
        );
    }

    #[test]
    fn test_for_current_host_picks_owning_mirror() {
        let normalizer =
            DomainNormalizer::for_current_host("www.stake.com", DEFAULT_MIRROR_HOSTS).unwrap();
        assert_eq!(normalizer.canonical_host(), "stake.com");
    }

    #[test]
    fn test_for_current_host_outside_set_falls_back_to_first() {
        let normalizer =
            DomainNormalizer::for_current_host("example.org", DEFAULT_MIRROR_HOSTS).unwrap();
        assert_eq!(normalizer.canonical_host(), "stake.us");
    }

    #[test]
    fn test_default_mirror_set_size() {
        let normalizer = DomainNormalizer::with_default_mirrors();
        assert_eq!(normalizer.mirrors().len(), 17);
        assert_eq!(normalizer.mirror_for("STAKE.BET"), Some("stake.bet"));
    }
}
