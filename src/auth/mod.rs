pub mod oauth;
pub mod token_store;
pub mod tokens_file;

use anyhow::Result;
use log::warn;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Credential provider for the pipeline: turns the configured OAuth client
/// into a usable access token, caching and refreshing along the way. The
/// rest of the program never touches token files or the keyring directly.
#[derive(Clone)]
pub struct TokenManager {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_id = cfg.client_id.clone();
        let redirect_uri = cfg
            .redirect_uri
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:8080/callback".to_string());

        let client_secret = match cfg.client_secret.clone() {
            Some(s) => Some(s),
            None => token_store::load_client_secret(&client_id)?
                .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok()),
        };

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Returns a valid access token; refreshes/PKCE if needed.
    pub fn get_access_token(&self) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        // 1) cached & not expired
        if let Some(tf) = tokens_file::TokensFile::load()? {
            if let Some(at) = tf.valid_access_token(now) {
                return Ok(at.to_string());
            }
        }

        // 2) refresh if possible, falling back to interactive auth
        if let Some(rt) = token_store::load_refresh_token(&self.client_id)? {
            match oauth::refresh_access_token(&self.client_id, self.client_secret.as_deref(), &rt)
            {
                Ok(t) => return self.persist(now, t),
                Err(e) => warn!("token refresh failed: {e:#}; falling back to interactive auth"),
            }
        }

        // 3) otherwise interactive PKCE
        let t = oauth::perform_pkce_flow(
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
            GMAIL_READONLY_SCOPE,
        )?;
        self.persist(now, t)
    }

    /// Best-effort persistence: the refresh token goes to the keyring, the
    /// access token and expiry to the tokens file. Neither failure should
    /// abort a run that already holds a usable access token.
    fn persist(&self, now: i64, t: oauth::Tokens) -> Result<String> {
        if let Some(rt) = &t.refresh_token {
            if let Err(e) = token_store::save_refresh_token(&self.client_id, rt) {
                warn!("couldn't save refresh token to keyring: {e:#}");
            }
        }
        let exp = t.expires_in.map(|s| now + s as i64).unwrap_or(now + 3500);
        if let Err(e) = tokens_file::TokensFile::save(&t.access_token, exp) {
            warn!("couldn't save token metadata: {e:#}");
        }
        Ok(t.access_token)
    }
}
