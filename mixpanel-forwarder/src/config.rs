use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

use crate::error::ConfigError;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "MIXPANEL_PROJECT_TOKEN")]
    pub project_token: NonEmptyString,

    // Only needed when use_import is on
    #[envconfig(from = "MIXPANEL_API_KEY", default = "")]
    pub api_key: String,

    #[envconfig(default = "false")]
    pub use_import: bool,

    pub distinct_id_key: NonEmptyString,

    pub event_key: Option<String>,

    pub event_type_key: Option<String>,

    pub ip_key: Option<String>,

    #[envconfig(default = "false")]
    pub event_map_tag: bool,

    // Strips a single leading '.' from the tag when event_map_tag is on
    #[envconfig(default = "true")]
    pub use_legacy_prefix_behavior: bool,

    #[envconfig(default = "false")]
    pub discard_event_on_send_error: bool,

    #[envconfig(default = "false")]
    pub batch_to_mixpanel: bool,

    #[envconfig(from = "MIXPANEL_API_HOST", default = "https://api.mixpanel.com")]
    pub api_host: String,

    #[envconfig(default = "10000")]
    pub request_timeout: EnvMsDuration,

    // Mixpanel accepts at most 50 messages per batch request
    #[envconfig(default = "50")]
    pub max_batch_size: usize,
}

impl Config {
    /// Load configuration from the environment and reject invalid combinations.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::init_from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_key.is_none() && !self.event_map_tag {
            return Err(ConfigError::MissingEventKey);
        }
        if self.use_import && self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens end up in here, keep them out of logs
impl std::fmt::Debug for NonEmptyString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NonEmptyString(..{} chars)", self.0.len())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}
