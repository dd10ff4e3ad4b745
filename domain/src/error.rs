//! Error types for the `domain` layer.
use hub::error::{AuthErrorKind, Error as HubError, ErrorKind as HubErrorKind};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure with
/// `domain::error::Error` as the root type holding a tree of `error_kind` enums.
/// The `source` field holds the original error. Errors are translated at the
/// boundary to the `hub` layer, which only needs to know whether to close the
/// connection as unauthorized and with which reason.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    Token(TokenErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    Other(String),
}

/// Enum representing why an access token was refused.
#[derive(Debug, PartialEq)]
pub enum TokenErrorKind {
    Invalid,
    Expired,
    MissingSubject,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let token_error_kind = match err.kind() {
            JwtErrorKind::ExpiredSignature => TokenErrorKind::Expired,
            _ => TokenErrorKind::Invalid,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Token(token_error_kind),
        }
    }
}

// This is where we translate errors from the `domain` layer to the `hub` layer.
impl From<Error> for HubError {
    fn from(err: Error) -> Self {
        let auth_error_kind = match err.error_kind {
            DomainErrorKind::Token(TokenErrorKind::MissingSubject) => {
                AuthErrorKind::MissingSubject
            }
            _ => AuthErrorKind::InvalidCredential,
        };

        HubError {
            source: Some(Box::new(err)),
            error_kind: HubErrorKind::Auth(auth_error_kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_subject_keeps_its_kind_across_layers() {
        let err = Error {
            source: None,
            error_kind: DomainErrorKind::Token(TokenErrorKind::MissingSubject),
        };
        let hub_err: HubError = err.into();
        assert_eq!(
            hub_err.kind(),
            &HubErrorKind::Auth(AuthErrorKind::MissingSubject)
        );
    }

    #[test]
    fn test_expired_token_is_an_invalid_credential_to_the_hub() {
        let err = Error {
            source: None,
            error_kind: DomainErrorKind::Token(TokenErrorKind::Expired),
        };
        let hub_err: HubError = err.into();
        assert_eq!(
            hub_err.kind(),
            &HubErrorKind::Auth(AuthErrorKind::InvalidCredential)
        );
        assert!(hub_err.source().is_some());
    }
}
