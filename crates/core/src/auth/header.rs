//! Gateway header authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Longest user id accepted from the header.
const MAX_USER_ID_LEN: usize = 128;

/// Authenticator trusting a user-id header set by an upstream gateway.
///
/// Login and session handling happen in front of this service; the gateway
/// forwards the resolved user id, which becomes the owner of uploaded orders.
pub struct HeaderAuthenticator {
    header: String,
}

impl HeaderAuthenticator {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_lowercase(),
        }
    }

    pub fn header_name(&self) -> &str {
        &self.header
    }
}

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let raw = request
            .headers
            .get(&self.header)
            .ok_or(AuthError::NotAuthenticated)?;

        let user_id = raw.trim();
        if user_id.is_empty() {
            return Err(AuthError::InvalidCredentials(format!(
                "empty {} header",
                self.header
            )));
        }
        if user_id.len() > MAX_USER_ID_LEN || user_id.chars().any(char::is_control) {
            return Err(AuthError::InvalidCredentials(format!(
                "malformed {} header",
                self.header
            )));
        }

        Ok(Identity::new(user_id, self.method_name()))
    }

    fn method_name(&self) -> &'static str {
        "header"
    }
}
