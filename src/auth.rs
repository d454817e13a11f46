//! Bearer-token access gateway.
//!
//! Tokens have the form `<user_id>.<hex hmac-sha256(secret, user_id)>`.
//! Verification resolves the stable user id that every lifecycle operation
//! is scoped to; the core trusts that id without further checks.

use anyhow::{bail, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies signed user tokens.
pub struct TokenGateway {
    secret: Vec<u8>,
}

impl TokenGateway {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            bail!("token secret must not be empty");
        }
        Ok(Self { secret })
    }

    /// Reads the secret from the environment variable named in `[auth]`.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let secret = std::env::var(&config.secret_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.secret_env)
        })?;
        Self::new(secret)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    pub fn issue(&self, user_id: &str) -> Result<String> {
        if user_id.trim().is_empty() {
            bail!("user id must not be empty");
        }
        let mut mac = self.mac();
        mac.update(user_id.as_bytes());
        Ok(format!(
            "{}.{}",
            user_id,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Returns the user id carried by a valid token.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (user_id, signature) = token.trim().rsplit_once('.')?;
        if user_id.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(user_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(user_id.to_string())
    }

    /// Extracts the user id from an `Authorization: Bearer <token>` value.
    pub fn verify_header(&self, header: &str) -> Option<String> {
        let token = header.strip_prefix("Bearer ")?;
        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> TokenGateway {
        TokenGateway::new("test-secret").unwrap()
    }

    #[test]
    fn issued_tokens_verify() {
        let gw = gateway();
        let token = gw.issue("alice@example.com").unwrap();
        assert_eq!(gw.verify(&token).as_deref(), Some("alice@example.com"));
        assert_eq!(
            gw.verify_header(&format!("Bearer {}", token)).as_deref(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let gw = gateway();
        let token = gw.issue("alice").unwrap();
        let (_, sig) = token.rsplit_once('.').unwrap();

        assert!(gw.verify(&format!("bob.{}", sig)).is_none());
        assert!(gw.verify("alice").is_none());
        assert!(gw.verify("alice.not-hex").is_none());
        assert!(gw.verify(&format!(".{}", sig)).is_none());
        assert!(gw.verify_header(&token).is_none());
    }

    #[test]
    fn secrets_are_not_interchangeable() {
        let token = gateway().issue("alice").unwrap();
        let other = TokenGateway::new("another-secret").unwrap();
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn empty_inputs_are_refused() {
        assert!(TokenGateway::new("").is_err());
        assert!(gateway().issue("  ").is_err());
    }
}
