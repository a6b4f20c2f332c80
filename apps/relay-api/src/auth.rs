//! Bearer-token validation for the relay handshake.
//!
//! The REST API issues HS256 tokens at login; the relay shares the signing
//! secret and derives connection identity from the verified claims rather
//! than trusting user ids supplied in event payloads.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by the platform's bearer tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User document id.
    pub id: String,
    /// Display name shown in presence and chat events.
    pub name: String,
    /// Expiry, seconds since Unix epoch.
    pub exp: usize,
}

/// Validate a bearer token and return its claims.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, &'static str> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|err| {
        tracing::debug!(?err, "token validation failed");
        "Invalid or expired token"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now_secs() -> usize {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize
    }

    fn mint(secret: &str, exp: usize) -> String {
        let claims = Claims {
            id: "usr_123".to_string(),
            name: "Alex".to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_round_trips() {
        let token = mint("secret", now_secs() + 3600);
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.id, "usr_123");
        assert_eq!(claims.name, "Alex");
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default leeway.
        let token = mint("secret", now_secs().saturating_sub(600));
        assert!(verify_token("secret", &token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("secret", now_secs() + 3600);
        assert!(verify_token("other-secret", &token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_token("secret", "not-a-token").is_err());
    }
}
