//! We never log anyone in. Somebody else hands out session cookies; all we
//! need to know for a given request is whose notes we are allowed to touch.

use super::{crypto::SessionKey, models::User, session};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// `None` means the caller is anonymous, and must not touch notes.
    async fn current_user(&self) -> Option<User>;
}

/// The `session` cookie of an incoming request, not yet verified.
pub struct CookieSession {
    key: Arc<SessionKey>,
    token: Option<String>,
}

impl CookieSession {
    pub fn new(key: Arc<SessionKey>, token: Option<String>) -> Self {
        Self { key, token }
    }
}

#[async_trait]
impl SessionProvider for CookieSession {
    async fn current_user(&self) -> Option<User> {
        let token = self.token.as_deref()?;
        match session::deserialize_session(&self.key, token) {
            Ok(session) => Some(session.user),
            Err(reason) => {
                debug!(reason, "rejecting session cookie");
                None
            }
        }
    }
}

/// A session that is whatever you say it is.
#[cfg(test)]
pub struct StaticSession(pub Option<User>);

#[cfg(test)]
#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_user(&self) -> Option<User> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{serialize_session, Session};
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "jack@jack.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_valid_cookie_yields_user() {
        let key = Arc::new(SessionKey::new("foo"));
        let user = user();
        let token =
            serialize_session(&key, &Session { user: user.clone() });

        let session = CookieSession::new(key, Some(token));
        assert_eq!(session.current_user().await, Some(user));
    }

    #[tokio::test]
    async fn test_missing_or_bad_cookie_is_anonymous() {
        let key = Arc::new(SessionKey::new("foo"));
        let token = serialize_session(
            &SessionKey::new("not foo"),
            &Session { user: user() },
        );

        assert_eq!(
            CookieSession::new(key.clone(), None).current_user().await,
            None
        );
        assert_eq!(
            CookieSession::new(key, Some(token)).current_user().await,
            None
        );
    }
}
