//! Local JWT claim decoding
//!
//! The client never verifies token signatures (that is the backend's job);
//! it only reads the payload to learn the embedded expiry so it can set
//! store max-ages and schedule the pre-emptive refresh. No network calls.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parq_protocol::Claims;

use crate::error::{ParqError, Result};

/// Decode the claims of a JWT without verifying its signature
pub fn decode_claims(token: &str) -> Result<Claims> {
    let mut parts = token.split('.');
    let (_header, payload) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(_sig), None) => (h, p),
        _ => {
            return Err(ParqError::invalid_input(
                "Malformed token: expected three dot-separated segments",
            ))
        }
    };

    let raw = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ParqError::invalid_input(format!("Malformed token payload: {}", e)))?;

    serde_json::from_slice(&raw)
        .map_err(|e| ParqError::invalid_input(format!("Malformed token claims: {}", e)))
}

/// Expiry instant embedded in the token
pub fn expires_at(token: &str) -> Result<DateTime<Utc>> {
    Ok(decode_claims(token)?.expires_at())
}

/// Whether the token's embedded expiry has already passed
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match expires_at(token) {
        Ok(exp) => exp <= now,
        // Undecodable tokens are treated as expired so bootstrap clears them
        Err(_) => true,
    }
}

#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &Claims) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{}.{}.sig", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token_with_exp(exp: i64) -> String {
        encode_unsigned(&Claims {
            sub: Some("7".into()),
            exp,
            iat: Some(exp - 900),
        })
    }

    #[test]
    fn decodes_exp_claim() {
        let token = token_with_exp(1_750_000_000);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, 1_750_000_000);
        assert_eq!(claims.sub.as_deref(), Some("7"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(decode_claims("not-a-token").is_err());
        assert!(decode_claims("a.b").is_err());
        assert!(decode_claims("a.!!!.c").is_err());
    }

    #[test]
    fn expiry_comparison() {
        let now = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        assert!(is_expired(&token_with_exp(1_749_999_999), now));
        assert!(is_expired(&token_with_exp(1_750_000_000), now));
        assert!(!is_expired(&token_with_exp(1_750_000_060), now));
    }

    #[test]
    fn undecodable_token_counts_as_expired() {
        assert!(is_expired("garbage", Utc::now()));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn roundtrip_preserves_claims(exp in 0i64..4_102_444_800, sub in "[a-z0-9]{1,16}") {
                let token = encode_unsigned(&Claims {
                    sub: Some(sub.clone()),
                    exp,
                    iat: None,
                });
                let decoded = decode_claims(&token).unwrap();
                prop_assert_eq!(decoded.exp, exp);
                prop_assert_eq!(decoded.sub, Some(sub));
            }

            #[test]
            fn expiry_decision_matches_claim(exp in 0i64..4_102_444_800, now in 0i64..4_102_444_800) {
                let token = encode_unsigned(&Claims { sub: None, exp, iat: None });
                let now = Utc.timestamp_opt(now, 0).unwrap();
                prop_assert_eq!(is_expired(&token, now), exp <= now.timestamp());
            }

            #[test]
            fn arbitrary_strings_never_panic(raw in "\\PC*") {
                // Malformed input must error, not panic
                let _ = decode_claims(&raw);
            }
        }
    }
}
