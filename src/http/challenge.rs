//! Heuristic detection of anti-bot challenge responses.
//!
//! Detection is advisory. Solving a challenge is out of scope; a positive
//! signal only tells the user that the clearance token needs refreshing.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, SERVER};

/// Header set by the challenge provider when it served an interstitial.
const MITIGATED_HEADER: &str = "cf-mitigated";

static CHALLENGE_BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<title>\s*(?:just a moment|attention required)|/cdn-cgi/challenge-platform/|cf-chl-|challenge-form",
    )
    .unwrap_or_else(|e| panic!("invalid static regex: {e}"))
});

/// Why a response was classified as a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeSignal {
    /// The provider explicitly marked the response as a challenge.
    MitigatedHeader,
    /// Error status served by the provider's edge.
    ProviderErrorStatus,
}

/// Classifies a response from its status and headers alone.
///
/// Only 403, 429 and 503 responses are considered; successful responses are
/// never flagged here.
#[must_use]
pub fn detect_challenge(status: StatusCode, headers: &HeaderMap) -> Option<ChallengeSignal> {
    if !matches!(status.as_u16(), 403 | 429 | 503) {
        return None;
    }

    let mitigated = headers
        .get(MITIGATED_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("challenge"));
    if mitigated {
        return Some(ChallengeSignal::MitigatedHeader);
    }

    let provider_edge = headers
        .get(SERVER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("cloudflare"));
    provider_edge.then_some(ChallengeSignal::ProviderErrorStatus)
}

/// Returns true if an HTML body contains known challenge interstitial markers.
#[must_use]
pub fn body_looks_like_challenge(html: &str) -> bool {
    CHALLENGE_BODY_RE.is_match(html)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_detect_challenge_mitigated_header_503() {
        let signal = detect_challenge(
            StatusCode::SERVICE_UNAVAILABLE,
            &headers(&[("cf-mitigated", "challenge")]),
        );
        assert_eq!(signal, Some(ChallengeSignal::MitigatedHeader));
    }

    #[test]
    fn test_detect_challenge_provider_server_403() {
        let signal = detect_challenge(StatusCode::FORBIDDEN, &headers(&[("server", "cloudflare")]));
        assert_eq!(signal, Some(ChallengeSignal::ProviderErrorStatus));
    }

    #[test]
    fn test_detect_challenge_ignores_success() {
        let signal = detect_challenge(StatusCode::OK, &headers(&[("cf-mitigated", "challenge")]));
        assert_eq!(signal, None);
    }

    #[test]
    fn test_detect_challenge_ignores_plain_503() {
        let signal = detect_challenge(StatusCode::SERVICE_UNAVAILABLE, &headers(&[("server", "nginx")]));
        assert_eq!(signal, None);
    }

    #[test]
    fn test_body_looks_like_challenge() {
        assert!(body_looks_like_challenge(
            "<html><head><title>Just a moment...</title></head></html>"
        ));
        assert!(body_looks_like_challenge(
            r#"<script src="/cdn-cgi/challenge-platform/h/b/orchestrate/jsch/v1"></script>"#
        ));
        assert!(!body_looks_like_challenge(
            "<html><head><title>Chapter 1</title></head></html>"
        ));
    }
}
