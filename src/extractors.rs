use super::{auth::CookieSession, models::AppState};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use regex::Regex;
use std::{convert::Infallible, sync::OnceLock};

fn session_cookie(cookie_header: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?:^|;\s*)session=([^;]+)")
            .unwrap_or_else(|e| unreachable!("session cookie regex: {e}"))
    });

    re.captures(cookie_header)
        .map(|captures| captures[1].to_string())
}

/// Never rejects; an absent or bogus cookie just makes for an anonymous
/// session, and it's up to the notes service to say no.
#[async_trait]
impl FromRequestParts<AppState> for CookieSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get_all("Cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(session_cookie);

        Ok(CookieSession::new(state.session_key.clone(), token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie() {
        assert_eq!(session_cookie("session=abc:def"), Some("abc:def".into()));
        assert_eq!(
            session_cookie("theme=dark; session=abc:d/e+f; lang=en"),
            Some("abc:d/e+f".into())
        );
        assert_eq!(session_cookie("theme=dark"), None);
        assert_eq!(session_cookie("not_session=abc"), None);
    }
}
