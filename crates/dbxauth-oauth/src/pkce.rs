//! PKCE verifier/challenge generation (RFC 7636, S256 method).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind each verifier (54 base64url characters).
pub const VERIFIER_BYTES: usize = 40;

/// PKCE code verifier and challenge pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge pair.
    ///
    /// Panics if the operating system's random source is unavailable.
    pub fn generate() -> Self {
        let mut verifier_bytes = [0u8; VERIFIER_BYTES];
        rand::rng().fill_bytes(&mut verifier_bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(verifier_bytes))
    }

    /// Build the pair for an existing verifier.
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = code_challenge_s256(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Recompute the challenge for `verifier` and compare it with `challenge`,
    /// the way the authorization server checks the token request.
    pub fn verify(verifier: &str, challenge: &str) -> bool {
        code_challenge_s256(verifier) == challenge
    }
}

/// `base64url_nopad(SHA-256(verifier))`.
pub fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_url_safe(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_pkce_generation() {
        let pkce = PkceChallenge::generate();
        assert!(pkce.verifier.len() >= 43);
        assert_eq!(pkce.verifier.len(), 54);
        assert!(is_url_safe(&pkce.verifier));
        assert!(!pkce.verifier.contains('='));
        assert!(is_url_safe(&pkce.challenge));
        assert!(!pkce.challenge.contains('='));
        assert_ne!(pkce.verifier, pkce.challenge);
    }

    #[test]
    fn test_generated_pairs_differ() {
        let a = PkceChallenge::generate();
        let b = PkceChallenge::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let first = code_challenge_s256("same-verifier");
        let second = code_challenge_s256("same-verifier");
        assert_eq!(first, second);
        assert_ne!(first, code_challenge_s256("other-verifier"));
    }

    #[test]
    fn test_known_challenge_value() {
        assert_eq!(
            code_challenge_s256("test-verifier-value"),
            "R-yFp3ykg184xTSr9BXHiHtbqWZXIG_H4B3K5EWSDzM"
        );
    }

    #[test]
    fn test_rfc7636_appendix_b() {
        let pkce = PkceChallenge::from_verifier("dBjftJeZ4CVP-mJ92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(
            pkce.challenge,
            "ngF5GsXcbwljx6u133FFr3Xht9xooA_DuaX_3QwODtc"
        );
    }

    #[test]
    fn test_verify_round_trip() {
        let pkce = PkceChallenge::generate();
        assert!(PkceChallenge::verify(&pkce.verifier, &pkce.challenge));
        assert!(!PkceChallenge::verify(&pkce.challenge, &pkce.challenge));
        assert!(!PkceChallenge::verify("test-verifier-value", &pkce.challenge));
    }
}
