use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "labelmail";

fn save(account: &str, value: &str) -> Result<()> {
    Entry::new(SERVICE, account)?
        .set_password(value)
        .map_err(|e| anyhow!(e.to_string()))
}

fn load(account: &str) -> Result<Option<String>> {
    match Entry::new(SERVICE, account)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Save a refresh token into the OS keyring, keyed by client_id
pub fn save_refresh_token(client_id: &str, refresh_token: &str) -> Result<()> {
    save(client_id, refresh_token)
}

/// Load the refresh token for the given client_id, if one was stored
pub fn load_refresh_token(client_id: &str) -> Result<Option<String>> {
    load(client_id)
}

/// Save a client secret into the keyring, keyed by client_id
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    save(&format!("{client_id}:secret"), client_secret)
}

/// Load the client secret for the given client_id, if one was stored
pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    load(&format!("{client_id}:secret"))
}
