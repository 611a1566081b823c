use serde::{Deserialize, Serialize};

/// JWT claims accepted by [`JwtSecurityGate`](super::JwtSecurityGate).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    pub sub: String, // User ID (Subject)
    pub name: Option<String>,
    pub roles: Option<Vec<String>>,
    pub permissions: Option<Vec<String>>,
    pub exp: usize, // Expiration time (UNIX timestamp)
}

impl UserClaims {
    /// True when the token grants every item in `requested`.
    ///
    /// A claim list that is absent grants nothing.
    pub(crate) fn grants<'a>(
        granted: Option<&[String]>,
        mut requested: impl Iterator<Item = &'a String>,
    ) -> bool {
        let granted = granted.unwrap_or_default();
        requested.all(|item| granted.contains(item))
    }
}
