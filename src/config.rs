use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    /// Optional: PKCE works without it. Also looked up in the keyring and
    /// the OAUTH_CLIENT_SECRET env var.
    pub client_secret: Option<String>,
    /// Messages carrying this label are the ones piped through.
    pub label_name: String,
    pub redirect_uri: Option<String>,
    /// When set, each message body goes to this program's stdin instead of
    /// being printed to the console.
    pub external_script_path: Option<PathBuf>,
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("labelmail"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            client_secret: None,
            label_name: "YOUR_LABEL".to_string(),
            redirect_uri: Some("http://127.0.0.1:8080/callback".to_string()),
            external_script_path: None,
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {} — edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}
