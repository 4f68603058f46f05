use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// SMTP delivery settings, editable at runtime through the settings endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Address the notification emails are sent from
    pub sender_email: String,
}

/// Configuration for the iTransfer server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL used when building download links (e.g. "http://files.example.com")
    pub public_url: String,
    /// Port the HTTP server binds to
    pub bind_port: u16,
    /// Where uploads and the transfer index are stored; defaults to the
    /// platform data directory when absent
    pub data_dir: Option<PathBuf>,
    /// Admin credentials for the login endpoint
    pub admin_username: String,
    pub admin_password: String,
    /// Mail delivery; uploads still succeed (with a warning) when unset
    pub smtp: Option<SmtpSettings>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:5500".to_string(),
            bind_port: 5500,
            data_dir: None,
            admin_username: "adminuser".to_string(),
            admin_password: "adminuserpassword".to_string(),
            smtp: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the default config file, falling back to
    /// defaults when no file exists yet
    pub fn load_or_default() -> Result<Self> {
        let config_path = get_config_file_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ServerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_file_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory at {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file at {}", path.display()))?;

        Ok(())
    }

    /// Check login credentials. Passwords are compared as blake3 hashes.
    pub fn verify_admin(&self, username: &str, password: &str) -> bool {
        let provided = blake3::hash(password.as_bytes());
        let stored = blake3::hash(self.admin_password.as_bytes());
        username == self.admin_username && provided == stored
    }

    /// Directory holding uploads and the transfer index
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_data_dir(),
        }
    }
}

/// Get the default config directory
pub fn get_config_dir() -> Result<PathBuf> {
    ProjectDirs::from("app", "itransfer", "itransfer")
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
        .context("Failed to determine config directory")
}

/// Get the default data directory
pub fn get_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("app", "itransfer", "itransfer")
        .map(|proj_dirs| proj_dirs.data_dir().to_path_buf())
        .context("Failed to determine data directory")
}

/// Get the path to the config file
pub fn get_config_file_path() -> Result<PathBuf> {
    let config_dir = get_config_dir()?;
    Ok(config_dir.join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_verification() {
        let config = ServerConfig {
            admin_username: "admin".to_string(),
            admin_password: "secret".to_string(),
            ..ServerConfig::default()
        };

        assert!(config.verify_admin("admin", "secret"));
        assert!(!config.verify_admin("admin", "wrong"));
        assert!(!config.verify_admin("someone", "secret"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = ServerConfig {
            smtp: Some(SmtpSettings {
                server: "smtp.example.com".to_string(),
                port: 587,
                user: "mailer".to_string(),
                password: "hunter2".to_string(),
                sender_email: "noreply@example.com".to_string(),
            }),
            ..ServerConfig::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = ServerConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.public_url, config.public_url);
        let smtp = loaded.smtp.unwrap();
        assert_eq!(smtp.server, "smtp.example.com");
        assert_eq!(smtp.port, 587);
    }
}
