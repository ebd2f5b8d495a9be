use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ZtaskError};

/// Try to run a CLI command and capture stdout as a token
fn try_cli_token(command: &str) -> Option<String> {
    let output = std::process::Command::new("sh")
        .args(["-c", command])
        .output()
        .ok()?;

    if output.status.success() {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            return Some(token);
        }
    }
    None
}

/// Stored token path: ~/.config/ztask/token
fn token_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("ztask").join("token"))
}

fn read_token(path: &std::path::Path) -> Option<String> {
    let token = std::fs::read_to_string(path).ok()?;
    let token = token.trim().to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn write_token(path: &std::path::Path, token: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, token)
}

/// Resolve the API token, trying in order:
/// 1. The env var named in config
/// 2. The stored token at ~/.config/ztask/token
/// 3. The configured token command (its output is stored for next time)
pub fn load_token(server: &ServerConfig) -> Result<String> {
    load_token_from(server, token_path())
}

fn load_token_from(server: &ServerConfig, stored: Option<PathBuf>) -> Result<String> {
    if let Some(env_var) = &server.token_env {
        if let Ok(token) = std::env::var(env_var) {
            if !token.trim().is_empty() {
                debug!(env_var = %env_var, "using token from environment");
                return Ok(token.trim().to_string());
            }
        }
    }

    if let Some(token) = stored.as_deref().and_then(read_token) {
        debug!("using stored token");
        return Ok(token);
    }

    if let Some(cmd) = &server.token_command {
        if let Some(token) = try_cli_token(cmd) {
            if let Some(path) = stored.as_deref() {
                if let Err(e) = write_token(path, &token) {
                    warn!(error = %e, "could not save token");
                }
            }
            return Ok(token);
        }
    }

    Err(ZtaskError::Auth(format!(
        "No Zadig API token found. Set {} or configure server.token_command.",
        server.token_env.as_deref().unwrap_or("a token env var")
    )))
}
