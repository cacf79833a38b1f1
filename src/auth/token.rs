use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppResult, AuthError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing keys
///
/// New tokens are always signed with the current secret. The previous secret,
/// when configured, is only accepted for verification so tokens issued before
/// a rotation stay valid until they expire.
pub struct TokenKeys {
    encoding: EncodingKey,
    current: DecodingKey,
    previous: Option<DecodingKey>,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, previous_secret: Option<&str>, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            current: DecodingKey::from_secret(secret.as_bytes()),
            previous: previous_secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// User id carried by a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        let claims = match decode::<Claims>(token, &self.current, &validation) {
            Ok(data) => data.claims,
            Err(_) => {
                let previous = self.previous.as_ref().ok_or(AuthError::InvalidToken)?;
                decode::<Claims>(token, previous, &validation)
                    .map_err(|_| AuthError::InvalidToken)?
                    .claims
            }
        };
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str, previous: Option<&str>) -> TokenKeys {
        TokenKeys::new(secret, previous, Duration::hours(1))
    }

    #[test]
    fn test_issue_then_verify() {
        let keys = keys("s3cret", None);
        let user = Uuid::new_v4();

        let token = keys.issue(user).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), user);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = keys("one", None).issue(Uuid::new_v4()).unwrap();
        assert!(matches!(keys("two", None).verify(&token), Err(AuthError::InvalidToken)));
        assert!(matches!(keys("one", None).verify("garbage"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_previous_secret_still_verifies() {
        let user = Uuid::new_v4();
        let old_token = keys("old", None).issue(user).unwrap();

        let rotated = keys("new", Some("old"));
        assert_eq!(rotated.verify(&old_token).unwrap(), user);

        // fresh tokens use the new secret only
        let new_token = rotated.issue(user).unwrap();
        assert!(keys("old", None).verify(&new_token).is_err());
        assert_eq!(keys("new", None).verify(&new_token).unwrap(), user);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys("s3cret", None);
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (now - Duration::hours(3)).timestamp(),
            exp: (now - Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();

        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken)));
    }
}
