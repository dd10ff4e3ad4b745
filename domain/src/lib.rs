//! Domain layer of the OmniHome hub: verification of the access tokens issued
//! by the authentication service.

pub mod error;
pub mod jwt;

pub use jwt::JwtVerifier;
