//! The seam to the token-issuing authentication service.
//!
//! The hub never issues credentials. It only asks a `TokenVerifier` to turn an
//! opaque credential into the identity of the subject it was issued to.

use crate::error::Error;

/// Identity of the authenticated subject owning a connection.
pub type UserId = String;

/// Verifies credentials presented at connection time.
///
/// Implementations must be cheap to call and must not block: verification runs
/// on the connection's own task right after the transport handshake.
pub trait TokenVerifier: Send + Sync {
    /// Returns the subject the credential was issued to, or an `Auth` error.
    fn verify(&self, credential: &str) -> Result<UserId, Error>;
}
