use tracing::{debug, warn};

use crate::config::{config_dir, GitHubConfig};
use crate::error::{FeedError, Result};

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

/// Stored token path: ~/.config/ghfeed/token
fn token_path() -> Option<std::path::PathBuf> {
    Some(config_dir()?.join("token"))
}

fn load_stored_token() -> Option<String> {
    let path = token_path()?;
    let token = std::fs::read_to_string(path).ok()?;
    non_empty(&token)
}

fn save_token(token: &str) -> std::io::Result<()> {
    if let Some(path) = token_path() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, token)?;
    }
    Ok(())
}

fn non_empty(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Find a GitHub token, trying in order:
/// 1. The configured environment variable
/// 2. The stored token in ~/.config/ghfeed/token
/// 3. The configured CLI command (its output is stored for next time)
pub fn load_token(config: &GitHubConfig) -> Result<String> {
    if let Some(env_var) = &config.token_env {
        if let Some(token) = std::env::var(env_var).ok().as_deref().and_then(non_empty) {
            debug!(env_var = %env_var, "using token from environment");
            return Ok(token);
        }
    }

    if let Some(token) = load_stored_token() {
        debug!("using stored token");
        return Ok(token);
    }

    if let Some(cmd) = &config.token_command {
        if let Some(token) = try_cli_token(cmd) {
            debug!(command = %cmd, "using token from command");
            if let Err(e) = save_token(&token) {
                warn!(error = %e, "could not store token");
            }
            return Ok(token);
        }
    }

    Err(FeedError::Auth(format!(
        "No GitHub token found. Set {} or configure github.token_command.",
        config.token_env.as_deref().unwrap_or("a token env var")
    )))
}
