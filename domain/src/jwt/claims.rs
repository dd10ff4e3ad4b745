//! Claims carried by the access tokens the authentication service issues.

use serde::{Deserialize, Serialize};

/// Access token claims. Only `sub` and `exp` matter to the hub; `sub` is the
/// user id and is optional here so its absence can be reported distinctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AccessClaims {
    #[serde(default)]
    pub(crate) sub: Option<String>,
    pub(crate) exp: u64,
}
