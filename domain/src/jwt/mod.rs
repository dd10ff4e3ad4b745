//! Verification of JSON Web Tokens presented when opening a hub connection.
//!
//! Tokens are HMAC-signed access tokens issued by the authentication service.
//! The hub accepts a token while its signature verifies, it has not expired,
//! and it names a subject.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain::JwtVerifier;
//! use jsonwebtoken::Algorithm;
//!
//! let verifier = JwtVerifier::new("shared-secret", Algorithm::HS256)?;
//! let user_id = verifier.verify_access_token(&token)?;
//! ```

use crate::error::{DomainErrorKind, Error, InternalErrorKind, TokenErrorKind};
use claims::AccessClaims;
use hub::{TokenVerifier, UserId};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use service::config::Config;
use std::str::FromStr;

pub(crate) mod claims;

pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Only the HMAC family is supported: the hub shares a secret with the issuer.
    pub fn new(secret: &str, algorithm: Algorithm) -> Result<Self, Error> {
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(Error {
                source: Some(format!("unsupported JWT algorithm {algorithm:?}").into()),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
            });
        }
        if secret.is_empty() {
            return Err(Error {
                source: Some("JWT secret key is empty".into()),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
            });
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(algorithm),
        })
    }

    /// Builds the verifier from the configured secret and algorithm.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let algorithm = Algorithm::from_str(config.jwt_algorithm()).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        })?;
        Self::new(config.jwt_secret_key(), algorithm)
    }

    /// Decode and validate `token`, returning the user id in its `sub` claim.
    pub fn verify_access_token(&self, token: &str) -> Result<UserId, Error> {
        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)?;

        match token_data.claims.sub {
            Some(sub) if !sub.is_empty() => Ok(sub),
            _ => {
                warn!("Access token has no subject");
                Err(Error {
                    source: None,
                    error_kind: DomainErrorKind::Token(TokenErrorKind::MissingSubject),
                })
            }
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, credential: &str) -> Result<UserId, hub::Error> {
        Ok(self.verify_access_token(credential)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub::error::{AuthErrorKind, ErrorKind as HubErrorKind};
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde_json::json;
    use service::config::Config;
    use clap::Parser;

    const SECRET: &str = "test-secret";

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(SECRET, Algorithm::HS256).unwrap()
    }

    #[test]
    fn test_valid_token_yields_subject() {
        let jwt = token(
            json!({"sub": "user-42", "exp": get_current_timestamp() + 600}),
            SECRET,
        );
        assert_eq!(verifier().verify(&jwt).unwrap(), "user-42");
    }

    #[test]
    fn test_wrong_signature_is_invalid() {
        let jwt = token(
            json!({"sub": "user-42", "exp": get_current_timestamp() + 600}),
            "other-secret",
        );
        let err = verifier().verify_access_token(&jwt).unwrap_err();
        assert_eq!(err.error_kind, DomainErrorKind::Token(TokenErrorKind::Invalid));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = token(
            json!({"sub": "user-42", "exp": get_current_timestamp() - 3600}),
            SECRET,
        );
        let err = verifier().verify_access_token(&jwt).unwrap_err();
        assert_eq!(err.error_kind, DomainErrorKind::Token(TokenErrorKind::Expired));
    }

    #[test]
    fn test_token_without_subject_is_reported_distinctly() {
        let jwt = token(json!({"exp": get_current_timestamp() + 600}), SECRET);
        let err = verifier().verify(&jwt).unwrap_err();
        assert_eq!(
            err.kind(),
            &HubErrorKind::Auth(AuthErrorKind::MissingSubject)
        );
    }

    #[test]
    fn test_garbage_is_an_invalid_credential() {
        let err = verifier().verify("not-a-jwt").unwrap_err();
        assert_eq!(
            err.kind(),
            &HubErrorKind::Auth(AuthErrorKind::InvalidCredential)
        );
    }

    #[test]
    fn test_from_config_uses_configured_secret() {
        let config = Config::try_parse_from(["omnihome", "--jwt-algorithm", "HS512"])
            .unwrap()
            .set_jwt_secret_key(SECRET.to_string());
        let verifier = JwtVerifier::from_config(&config).unwrap();

        let jwt = encode(
            &Header::new(Algorithm::HS512),
            &json!({"sub": "user-7", "exp": get_current_timestamp() + 600}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(verifier.verify_access_token(&jwt).unwrap(), "user-7");

        // An HS256 token does not satisfy an HS512 verifier
        let hs256 = token(
            json!({"sub": "user-7", "exp": get_current_timestamp() + 600}),
            SECRET,
        );
        assert!(verifier.verify_access_token(&hs256).is_err());
    }

    #[test]
    fn test_asymmetric_algorithms_are_refused() {
        assert!(JwtVerifier::new(SECRET, Algorithm::RS256).is_err());
        assert!(JwtVerifier::new("", Algorithm::HS256).is_err());
    }
}
