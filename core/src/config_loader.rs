//! Layered configuration loader.
//!
//! Three layers, later ones win:
//! 1. Defaults
//! 2. `config.toml` in the notes home directory
//! 3. `NOTES_*` environment overrides
//!
//! The file accepts both our own key names and the names used by the
//! backend's generated `aws-exports` file, so an exported configuration can
//! be pasted in unchanged.
//!
//! ```no_run
//! use notes_core::config_loader::ConfigLoader;
//!
//! let config = ConfigLoader::new().load().expect("config");
//! println!("{}", config.graphql_endpoint);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use toml::Value as TomlValue;

/// Configuration file name inside the notes home.
pub const CONFIG_FILE: &str = "config.toml";

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigLoadError {
    /// I/O error reading config file
    IoError(std::io::Error),

    /// TOML parsing error
    TomlParseError(toml::de::Error),

    /// Configuration validation error
    ValidationError(String),

    /// Missing required field
    MissingRequiredField { field: String, context: String },

    /// Invalid environment variable value
    InvalidEnvValue {
        var: String,
        value: String,
        expected: String,
    },
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLoadError::IoError(e) => write!(f, "I/O error loading config: {e}"),
            ConfigLoadError::TomlParseError(e) => write!(f, "TOML parsing error: {e}"),
            ConfigLoadError::ValidationError(msg) => write!(f, "Config validation error: {msg}"),
            ConfigLoadError::MissingRequiredField { field, context } => {
                write!(f, "Missing required field '{field}' in {context}")
            }
            ConfigLoadError::InvalidEnvValue {
                var,
                value,
                expected,
            } => write!(
                f,
                "Invalid value for ${var}: '{value}' (expected: {expected})"
            ),
        }
    }
}

impl std::error::Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigLoadError::IoError(e) => Some(e),
            ConfigLoadError::TomlParseError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigLoadError {
    fn from(err: std::io::Error) -> Self {
        ConfigLoadError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigLoadError {
    fn from(err: toml::de::Error) -> Self {
        ConfigLoadError::TomlParseError(err)
    }
}

/// How the backend authorizes requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    /// User-pool JWT in the `Authorization` header.
    AmazonCognitoUserPools,
    /// OIDC token in the `Authorization` header.
    OpenidConnect,
    /// Static key in the `x-api-key` header; no sign-in needed.
    ApiKey,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::AmazonCognitoUserPools => "AMAZON_COGNITO_USER_POOLS",
            AuthType::OpenidConnect => "OPENID_CONNECT",
            AuthType::ApiKey => "API_KEY",
        }
    }
}

impl FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AMAZON_COGNITO_USER_POOLS" => Ok(AuthType::AmazonCognitoUserPools),
            "OPENID_CONNECT" => Ok(AuthType::OpenidConnect),
            "API_KEY" => Ok(AuthType::ApiKey),
            other => Err(format!("unknown authentication type '{other}'")),
        }
    }
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How local state is kept consistent after mutations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Re-run the list query after a delete; no change streams.
    Reload,
    /// Fold created/updated/deleted change streams into local state.
    #[default]
    Subscriptions,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Reload => "reload",
            SyncMode::Subscriptions => "subscriptions",
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reload" => Ok(SyncMode::Reload),
            "subscriptions" | "subscription" => Ok(SyncMode::Subscriptions),
            other => Err(format!("unknown sync mode '{other}'")),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotesConfig {
    /// Directory holding `config.toml` and `session.json`.
    pub notes_home: PathBuf,
    pub graphql_endpoint: String,
    pub region: String,
    pub authentication_type: AuthType,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub sync_mode: SyncMode,
    pub request_timeout_secs: u64,
}

impl NotesConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration data with all layers merged.
///
/// All fields are `Option` so layers can be stacked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayeredConfig {
    #[serde(default, alias = "aws_appsync_graphqlEndpoint")]
    pub graphql_endpoint: Option<String>,

    #[serde(default, alias = "aws_appsync_region")]
    pub region: Option<String>,

    #[serde(default, alias = "aws_appsync_authenticationType")]
    pub authentication_type: Option<AuthType>,

    #[serde(default, alias = "aws_appsync_apiKey")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub sync_mode: Option<SyncMode>,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Unrecognised keys, kept for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, TomlValue>,
}

/// Prefix of the environment overrides, e.g. `NOTES_GRAPHQL_ENDPOINT`.
pub const ENV_PREFIX: &str = "NOTES";

/// Builder for layered configuration loading.
pub struct ConfigLoader {
    notes_home: Option<PathBuf>,
    skip_file: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// By default the home directory is auto-detected and all layers are
    /// enabled.
    pub fn new() -> Self {
        Self {
            notes_home: None,
            skip_file: false,
        }
    }

    pub fn with_notes_home(mut self, path: PathBuf) -> Self {
        self.notes_home = Some(path);
        self
    }

    pub fn skip_file_layer(mut self) -> Self {
        self.skip_file = true;
        self
    }

    /// Loads with all enabled layers, reading overrides from the process
    /// environment.
    pub fn load(self) -> Result<NotesConfig, ConfigLoadError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load) but with an explicit environment lookup.
    pub fn load_with_env(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<NotesConfig, ConfigLoadError> {
        let notes_home = self.resolve_notes_home()?;
        let mut config = Self::default_config();

        if !self.skip_file {
            let file_config = Self::load_from_file(&notes_home)?;
            Self::merge_config(&mut config, file_config);
        }

        Self::apply_env_overrides(&mut config, ENV_PREFIX, lookup)?;

        Self::finalize(config, notes_home)
    }

    fn resolve_notes_home(&self) -> Result<PathBuf, ConfigLoadError> {
        if let Some(ref path) = self.notes_home {
            return Ok(path.clone());
        }
        notes_session::find_notes_home().map_err(|e| ConfigLoadError::ValidationError(e.to_string()))
    }

    /// Defaults that need no file at all, except for the endpoint which
    /// has no sensible default.
    pub fn default_config() -> LayeredConfig {
        LayeredConfig {
            graphql_endpoint: None,
            region: Some(DEFAULT_REGION.to_string()),
            authentication_type: Some(AuthType::AmazonCognitoUserPools),
            api_key: None,
            sync_mode: Some(SyncMode::default()),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            extra: BTreeMap::new(),
        }
    }

    /// Reads `config.toml` from `notes_home`. A missing file is an empty
    /// layer, not an error.
    pub fn load_from_file(notes_home: &Path) -> Result<LayeredConfig, ConfigLoadError> {
        let config_path = notes_home.join(CONFIG_FILE);

        let contents = match std::fs::read_to_string(&config_path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, using defaults", config_path.display());
                return Ok(LayeredConfig::default());
            }
            Err(e) => return Err(ConfigLoadError::IoError(e)),
        };

        let layered: LayeredConfig = toml::from_str(&contents)?;
        for key in layered.extra.keys() {
            tracing::warn!("ignoring unknown config key '{key}' in {}", config_path.display());
        }
        Ok(layered)
    }

    /// Merges `overlay` into `base`, preferring values present in the overlay.
    pub fn merge_config(base: &mut LayeredConfig, overlay: LayeredConfig) {
        if overlay.graphql_endpoint.is_some() {
            base.graphql_endpoint = overlay.graphql_endpoint;
        }
        if overlay.region.is_some() {
            base.region = overlay.region;
        }
        if overlay.authentication_type.is_some() {
            base.authentication_type = overlay.authentication_type;
        }
        if overlay.api_key.is_some() {
            base.api_key = overlay.api_key;
        }
        if overlay.sync_mode.is_some() {
            base.sync_mode = overlay.sync_mode;
        }
        if overlay.request_timeout_secs.is_some() {
            base.request_timeout_secs = overlay.request_timeout_secs;
        }
        base.extra.extend(overlay.extra);
    }

    /// Applies `<PREFIX>_*` overrides.
    ///
    /// Supported: `GRAPHQL_ENDPOINT`, `REGION`, `AUTH_TYPE`, `API_KEY`,
    /// `SYNC_MODE`, `REQUEST_TIMEOUT_SECS`.
    pub fn apply_env_overrides(
        config: &mut LayeredConfig,
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigLoadError> {
        let get = |suffix: &str| {
            let var = format!("{prefix}_{suffix}");
            lookup(&var).filter(|v| !v.is_empty()).map(|v| (var, v))
        };

        if let Some((_, value)) = get("GRAPHQL_ENDPOINT") {
            config.graphql_endpoint = Some(value);
        }
        if let Some((_, value)) = get("REGION") {
            config.region = Some(value);
        }
        if let Some((var, value)) = get("AUTH_TYPE") {
            let parsed = value
                .parse::<AuthType>()
                .map_err(|_| ConfigLoadError::InvalidEnvValue {
                    var,
                    value: value.clone(),
                    expected: "AMAZON_COGNITO_USER_POOLS, OPENID_CONNECT or API_KEY".to_string(),
                })?;
            config.authentication_type = Some(parsed);
        }
        if let Some((_, value)) = get("API_KEY") {
            config.api_key = Some(value);
        }
        if let Some((var, value)) = get("SYNC_MODE") {
            let parsed = value
                .parse::<SyncMode>()
                .map_err(|_| ConfigLoadError::InvalidEnvValue {
                    var,
                    value: value.clone(),
                    expected: "reload or subscriptions".to_string(),
                })?;
            config.sync_mode = Some(parsed);
        }
        if let Some((var, value)) = get("REQUEST_TIMEOUT_SECS") {
            let parsed = value
                .parse::<u64>()
                .map_err(|_| ConfigLoadError::InvalidEnvValue {
                    var,
                    value: value.clone(),
                    expected: "a positive integer".to_string(),
                })?;
            config.request_timeout_secs = Some(parsed);
        }

        Ok(())
    }

    /// Validates the merged layers and produces the final config.
    fn finalize(config: LayeredConfig, notes_home: PathBuf) -> Result<NotesConfig, ConfigLoadError> {
        let graphql_endpoint =
            config
                .graphql_endpoint
                .ok_or_else(|| ConfigLoadError::MissingRequiredField {
                    field: "graphql_endpoint".to_string(),
                    context: format!("{CONFIG_FILE} or $NOTES_GRAPHQL_ENDPOINT"),
                })?;

        let url = reqwest::Url::parse(&graphql_endpoint).map_err(|e| {
            ConfigLoadError::ValidationError(format!(
                "graphql_endpoint '{graphql_endpoint}' is not a valid URL: {e}"
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigLoadError::ValidationError(format!(
                "graphql_endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }

        let authentication_type = config
            .authentication_type
            .unwrap_or(AuthType::AmazonCognitoUserPools);
        if authentication_type == AuthType::ApiKey && config.api_key.is_none() {
            return Err(ConfigLoadError::MissingRequiredField {
                field: "api_key".to_string(),
                context: "API_KEY authentication".to_string(),
            });
        }

        let request_timeout_secs = config
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigLoadError::ValidationError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(NotesConfig {
            notes_home,
            graphql_endpoint,
            region: config.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            authentication_type,
            api_key: config.api_key,
            sync_mode: config.sync_mode.unwrap_or_default(),
            request_timeout_secs,
        })
    }
}
