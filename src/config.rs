use crate::error::{Result, SecurityError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level security configuration.
///
/// When `directory` is present the directory provider is used for
/// authentication; otherwise the local account store is the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub local: LocalStoreConfig,
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
    pub authorization: AuthorizationConfig,
}

impl SecurityConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: SecurityConfig = toml::from_str(&raw)
            .map_err(|e| SecurityError::Config(format!("invalid security config: {e}")))?;
        if let Some(directory) = &config.directory {
            directory.validate()?;
        }
        Ok(config)
    }
}

/// Configuration for the file-backed local account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    /// Path of the persisted account list.
    pub accounts_path: PathBuf,
    #[serde(default)]
    pub digest_algorithm: DigestAlgorithm,
    #[serde(default)]
    pub digest_encoding: DigestEncoding,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            accounts_path: PathBuf::from("users.json"),
            digest_algorithm: DigestAlgorithm::default(),
            digest_encoding: DigestEncoding::default(),
        }
    }
}

/// Configuration for the namespace authorization resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    /// Directory holding one permission record file per namespace node.
    pub rules_dir: PathBuf,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("permissions"),
        }
    }
}

/// Remote directory (LDAP) configuration.
///
/// Presence of `user_pattern` selects user-lookup mode; its absence selects
/// user-search mode, which requires a search base, at least one search
/// pattern, and a bind principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub connection_url: String,
    #[serde(default)]
    pub alternate_url: Option<String>,
    #[serde(default)]
    pub connection_protocol: Option<String>,
    #[serde(default)]
    pub security_authentication: Option<String>,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default)]
    pub connection_principal: Option<String>,
    #[serde(default)]
    pub connection_password: Option<String>,

    /// User-lookup mode: template mapping a user id to a distinguished name,
    /// e.g. `uid={0},ou=people,dc=example,dc=org`.
    #[serde(default)]
    pub user_pattern: Option<String>,

    /// User-search mode settings.
    #[serde(default)]
    pub user_search_base: Option<String>,
    #[serde(default)]
    pub user_search_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub search_user_subtree: bool,
    #[serde(default = "default_user_search_timeout_ms")]
    pub user_search_timeout_ms: u64,

    // Attribute name overrides.
    #[serde(default = "default_user_id_attribute")]
    pub user_id_attribute: String,
    #[serde(default = "default_user_last_name_attribute")]
    pub user_last_name_attribute: String,
    #[serde(default = "default_user_first_name_attribute")]
    pub user_first_name_attribute: String,
    #[serde(default = "default_user_full_name_attribute")]
    pub user_full_name_attribute: String,
    #[serde(default = "default_user_email_attribute")]
    pub user_email_attribute: String,
    #[serde(default = "default_user_password_attribute")]
    pub user_password_attribute: String,

    #[serde(default)]
    pub referral_strategy: ReferralStrategy,

    /// Digest settings for password-attribute comparison (lookup mode only).
    #[serde(default)]
    pub digest_algorithm: DigestAlgorithm,
    #[serde(default)]
    pub digest_encoding: DigestEncoding,

    #[serde(default = "default_authentication_cache_timeout_ms")]
    pub authentication_cache_timeout_ms: u64,
    #[serde(default = "default_profile_cache_timeout_ms")]
    pub profile_cache_timeout_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            connection_url: String::new(),
            alternate_url: None,
            connection_protocol: None,
            security_authentication: None,
            connection_timeout_ms: default_connection_timeout_ms(),
            connection_principal: None,
            connection_password: None,
            user_pattern: None,
            user_search_base: None,
            user_search_patterns: Vec::new(),
            search_user_subtree: true,
            user_search_timeout_ms: default_user_search_timeout_ms(),
            user_id_attribute: default_user_id_attribute(),
            user_last_name_attribute: default_user_last_name_attribute(),
            user_first_name_attribute: default_user_first_name_attribute(),
            user_full_name_attribute: default_user_full_name_attribute(),
            user_email_attribute: default_user_email_attribute(),
            user_password_attribute: default_user_password_attribute(),
            referral_strategy: ReferralStrategy::default(),
            digest_algorithm: DigestAlgorithm::default(),
            digest_encoding: DigestEncoding::default(),
            authentication_cache_timeout_ms: default_authentication_cache_timeout_ms(),
            profile_cache_timeout_ms: default_profile_cache_timeout_ms(),
        }
    }
}

impl DirectoryConfig {
    /// Check mandatory settings; mode selection happens at provider
    /// construction and bad combinations must fail there, not at first use.
    pub fn validate(&self) -> Result<()> {
        if self.connection_url.is_empty() {
            return Err(SecurityError::Config(
                "directory connection_url is required".to_string(),
            ));
        }
        match &self.user_pattern {
            Some(pattern) => {
                if pattern.is_empty() {
                    return Err(SecurityError::Config(
                        "directory user_pattern must not be empty".to_string(),
                    ));
                }
                if !self.user_search_patterns.is_empty() {
                    return Err(SecurityError::Config(
                        "user_pattern and user_search_patterns are mutually exclusive".to_string(),
                    ));
                }
            }
            None => {
                if self.user_search_base.is_none() {
                    return Err(SecurityError::Config(
                        "directory user_search_base is required in search mode".to_string(),
                    ));
                }
                if self.user_search_patterns.is_empty() {
                    return Err(SecurityError::Config(
                        "at least one user_search_pattern is required in search mode".to_string(),
                    ));
                }
                if self.connection_principal.is_none() {
                    return Err(SecurityError::Config(
                        "directory connection_principal is required in search mode".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// True when a user-lookup template is configured.
    pub fn is_lookup_mode(&self) -> bool {
        self.user_pattern.is_some()
    }
}

/// How directory referrals are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStrategy {
    #[default]
    Ignore,
    Follow,
    Throw,
}

/// Digest algorithm used for stored credential comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

/// Text encoding of digest output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DigestEncoding {
    #[default]
    Hex,
    Base64,
}

fn default_connection_timeout_ms() -> u64 {
    5_000
}

fn default_user_search_timeout_ms() -> u64 {
    30_000
}

fn default_authentication_cache_timeout_ms() -> u64 {
    300_000
}

fn default_profile_cache_timeout_ms() -> u64 {
    600_000
}

fn default_true() -> bool {
    true
}

fn default_user_id_attribute() -> String {
    "uid".to_string()
}

fn default_user_last_name_attribute() -> String {
    "sn".to_string()
}

fn default_user_first_name_attribute() -> String {
    "givenName".to_string()
}

fn default_user_full_name_attribute() -> String {
    "cn".to_string()
}

fn default_user_email_attribute() -> String {
    "mail".to_string()
}

fn default_user_password_attribute() -> String {
    "userPassword".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_defaults() {
        let config = DirectoryConfig::default();
        assert_eq!(config.connection_timeout_ms, 5_000);
        assert_eq!(config.authentication_cache_timeout_ms, 300_000);
        assert_eq!(config.user_id_attribute, "uid");
        assert_eq!(config.user_password_attribute, "userPassword");
        assert_eq!(config.referral_strategy, ReferralStrategy::Ignore);
        assert!(config.search_user_subtree);
    }

    #[test]
    fn test_validate_requires_url() {
        let config = DirectoryConfig::default();
        assert!(matches!(
            config.validate(),
            Err(SecurityError::Config(_))
        ));
    }

    #[test]
    fn test_validate_search_mode_requirements() {
        let config = DirectoryConfig {
            connection_url: "ldap://localhost:389".to_string(),
            user_search_base: Some("ou=people,dc=example,dc=org".to_string()),
            user_search_patterns: vec!["(uid={0})".to_string()],
            ..Default::default()
        };
        // Missing bind principal for search operations.
        assert!(config.validate().is_err());

        let config = DirectoryConfig {
            connection_principal: Some("cn=service,dc=example,dc=org".to_string()),
            ..config
        };
        assert!(config.validate().is_ok());
        assert!(!config.is_lookup_mode());
    }

    #[test]
    fn test_validate_mode_exclusivity() {
        let config = DirectoryConfig {
            connection_url: "ldap://localhost:389".to_string(),
            user_pattern: Some("uid={0},ou=people,dc=example,dc=org".to_string()),
            user_search_patterns: vec!["(uid={0})".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let toml_src = r#"
            [local]
            accounts_path = "users.json"

            [authorization]
            rules_dir = "permissions"

            [directory]
            connection_url = "ldap://primary:389"
            alternate_url = "ldap://backup:389"
            user_pattern = "uid={0},ou=people,dc=example,dc=org"
            digest_algorithm = "SHA-256"
            digest_encoding = "hex"
        "#;
        let config: SecurityConfig = toml::from_str(toml_src).unwrap();
        let directory = config.directory.unwrap();
        assert!(directory.is_lookup_mode());
        assert_eq!(directory.alternate_url.as_deref(), Some("ldap://backup:389"));
        assert_eq!(directory.digest_algorithm, DigestAlgorithm::Sha256);
    }
}
