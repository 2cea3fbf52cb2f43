use anyhow::{bail, Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::env;

type HmacSha256 = Hmac<Sha256>;

/// Secret shared with whatever issues session cookies.
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn from_env() -> Result<Self> {
        let secret = env::var("SESSION_SECRET")
            .context("session secret to be defined in the environment")?;
        if secret.is_empty() {
            bail!("SESSION_SECRET must not be empty");
        }

        Ok(Self::new(secret))
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"))
    }

    pub fn get_digest(&self, val: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(val);

        mac.finalize().into_bytes().to_vec()
    }

    pub fn is_valid(&self, val: &[u8], digest: &[u8]) -> bool {
        let mut mac = self.mac();
        mac.update(val);

        mac.verify_slice(digest).is_ok()
    }
}
