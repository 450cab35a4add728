use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Non-secret access-token metadata cached in
/// ~/.config/labelmail/tokens.json. The refresh token never lands here;
/// that one lives in the keyring.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TokensFile {
    pub access_token: Option<String>,
    // epoch seconds
    pub expires_at_epoch: Option<i64>,
}

impl TokensFile {
    /// The cached access token, if it is still good at `now`.
    pub fn valid_access_token(&self, now: i64) -> Option<&str> {
        match (&self.access_token, self.expires_at_epoch) {
            (Some(at), Some(exp)) if now < exp => Some(at),
            _ => None,
        }
    }

    pub fn load() -> Result<Option<Self>> {
        let p = tokens_path()?;
        if !p.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&p)?;
        Ok(Some(serde_json::from_str(&s)?))
    }

    pub fn save(access_token: &str, expires_at_epoch: i64) -> Result<()> {
        let tf = TokensFile {
            access_token: Some(access_token.to_string()),
            expires_at_epoch: Some(expires_at_epoch),
        };
        let s = serde_json::to_string_pretty(&tf)?;
        fs::write(tokens_path()?, s)?;
        Ok(())
    }
}

fn tokens_path() -> Result<PathBuf> {
    let mut p = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("labelmail");
    fs::create_dir_all(&p)?;
    p.push("tokens.json");
    Ok(p)
}
