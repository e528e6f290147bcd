//! Caller identity carried by bearer tokens
//!
//! Tokens are issued by the external identity provider; this server only
//! verifies them.

use serde::{Deserialize, Serialize};

/// JWT claims identifying the calling member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerClaims {
    pub sub: String,
    pub user_id: i64,
    pub exp: i64,
    pub iat: i64,
}

impl CallerClaims {
    /// Create a signed token (identity provider side, and tests)
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn claims(exp_offset: Duration) -> CallerClaims {
        let now = Utc::now();
        CallerClaims {
            sub: "member-42".to_string(),
            user_id: 42,
            exp: (now + exp_offset).timestamp(),
            iat: now.timestamp(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = claims(Duration::hours(1)).create_token("secret").unwrap();
        let parsed = CallerClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 42);
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let token = claims(Duration::hours(1)).create_token("secret").unwrap();
        assert!(CallerClaims::from_token(&token, "other").is_err());

        let expired = claims(-Duration::hours(1)).create_token("secret").unwrap();
        assert!(CallerClaims::from_token(&expired, "secret").is_err());
    }
}
