use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Validation, DecodingKey};
#[cfg(test)]
use jsonwebtoken::{encode, Header, EncodingKey};
use serde::{Deserialize, Serialize};

use crate::models::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Account ID
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

pub struct JwtService;

impl JwtService {
    pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        Self::verify_with(token, crate::config::Config::jwt_secret().as_deref())
    }

    /// Tokens are issued by the accounts service; signing lives here for tests.
    #[cfg(test)]
    pub(crate) fn sign(account_id: &str, role: Role, secret: &str, expiry: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            sub: account_id.to_string(),
            role,
            exp: now + expiry,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Without a secret every token is rejected.
    fn verify_with(token: &str, secret: Option<&str>) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = secret.ok_or(ErrorKind::InvalidKeyFormat)?;
        let token_data = decode::<Claims>(
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

    #[test]
    fn signed_token_verifies_with_same_secret() {
        let token = JwtService::sign("65f0c0ffee", Role::Admin, "s3cret", 60).unwrap();
        let claims = JwtService::verify_with(&token, Some("s3cret")).unwrap();
        assert_eq!(claims.sub, "65f0c0ffee");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let token = JwtService::sign("acc", Role::Student, "s3cret", 60).unwrap();
        assert!(JwtService::verify_with(&token, Some("other")).is_err());

        // Past the default 60s leeway.
        let stale = JwtService::sign("acc", Role::Student, "s3cret", -3600).unwrap();
        assert!(JwtService::verify_with(&stale, Some("s3cret")).is_err());
    }

    #[test]
    fn missing_secret_rejects_every_token() {
        let token = JwtService::sign("acc", Role::Admin, "", 60).unwrap();
        assert!(JwtService::verify_with(&token, None).is_err());

        let token = JwtService::sign("acc", Role::Admin, "default-secret", 60).unwrap();
        assert!(JwtService::verify_with(&token, None).is_err());
    }

    #[test]
    fn configured_secret_round_trips() {
        let secret = crate::config::Config::jwt_secret().unwrap();
        let token = JwtService::sign("acc", Role::Student, &secret, 60).unwrap();
        assert_eq!(JwtService::verify_token(&token).unwrap().sub, "acc");
    }
}
