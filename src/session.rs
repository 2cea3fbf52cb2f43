use super::{crypto::SessionKey, models::User};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// HMAC-secured session string, signed with $SESSION_SECRET
///
/// Sessions are minted by the identity service at login; this service only
/// ever reads them. Since this guy is stored in a browser cookie, it's
/// important to ensure it does not get too large.
#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
}

#[cfg(test)]
pub fn serialize_session(key: &SessionKey, session: &Session) -> String {
    let json_bytes = serde_json::to_string(&session)
        .expect("session can be JSON serialized");
    let b64 = general_purpose::STANDARD_NO_PAD.encode(json_bytes);
    let raw_digest = key.get_digest(b64.as_bytes());
    let digest = general_purpose::STANDARD_NO_PAD.encode(raw_digest);

    format!("{}:{}", b64, digest)
}

pub fn deserialize_session(
    key: &SessionKey,
    cookie: &str,
) -> Result<Session, &'static str> {
    let Some((b64_json, b64_digest)) = cookie.split_once(':') else {
        return Err("Invalid session");
    };
    if b64_digest.contains(':') {
        return Err("Invalid session");
    }
    let digest = general_purpose::STANDARD_NO_PAD
        .decode(b64_digest)
        .map_err(|_| "Cannot base64 decode the digest")?;

    if !key.is_valid(b64_json.as_bytes(), &digest) {
        return Err("Failed to validate session signature");
    }
    let json_string = general_purpose::STANDARD_NO_PAD
        .decode(b64_json)
        .map_err(|_| "Cannot base64 decode session string")?;

    serde_json::from_slice(&json_string)
        .map_err(|_| "Cannot deserialize session JSON")
}
