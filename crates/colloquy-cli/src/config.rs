//! Client configuration loading from file and environment variables.

use colloquy_types::ConversationContext;
use colloquy_voice::VoiceConfig;
use serde::Deserialize;
use thiserror::Error;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Backend and realtime endpoint settings.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Who is talking to which bot.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity of the conversation this client takes part in.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    #[serde(default = "default_participant_id")]
    pub participant_id: String,

    /// Left empty to generate a fresh id per run.
    #[serde(default)]
    pub conversation_id: Option<String>,

    #[serde(default)]
    pub study_name: Option<String>,

    #[serde(default)]
    pub user_group: Option<String>,

    #[serde(default)]
    pub survey_id: Option<String>,

    #[serde(default)]
    pub survey_meta_data: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "colloquy_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_bot_name() -> String {
    "default".to_string()
}

fn default_participant_id() -> String {
    "anonymous".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            participant_id: default_participant_id(),
            conversation_id: None,
            study_name: None,
            user_group: None,
            survey_id: None,
            survey_meta_data: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ConversationConfig {
    /// Builds the context for one run, generating a conversation id if none
    /// is configured.
    pub fn to_context(&self) -> ConversationContext {
        let mut context = ConversationContext::new(
            self.bot_name.clone(),
            self.participant_id.clone(),
            self.conversation_id.clone(),
        );
        context.study_name = self.study_name.clone();
        context.user_group = self.user_group.clone();
        context.survey_id = self.survey_id.clone();
        context.survey_meta_data = self.survey_meta_data.clone();
        context
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `COLLOQUY_API_URL` overrides `voice.api_url`
/// - `COLLOQUY_REALTIME_URL` overrides `voice.realtime_url`
/// - `COLLOQUY_MODEL` overrides `voice.model`
/// - `COLLOQUY_BOT_NAME` overrides `conversation.bot_name`
/// - `COLLOQUY_PARTICIPANT_ID` overrides `conversation.participant_id`
/// - `COLLOQUY_CONVERSATION_ID` overrides `conversation.conversation_id`
/// - `COLLOQUY_LOG_LEVEL` overrides `logging.level`
/// - `COLLOQUY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = read_config(path)?;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn read_config(path: Option<&str>) -> Result<Config, ConfigError> {
    match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::FileRead(e)),
        },
        None => Ok(Config::default()),
    }
}

fn apply_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("COLLOQUY_API_URL") {
        config.voice.api_url = url;
    }
    if let Some(url) = var("COLLOQUY_REALTIME_URL") {
        config.voice.realtime_url = url;
    }
    if let Some(model) = var("COLLOQUY_MODEL") {
        config.voice.model = model;
    }
    if let Some(bot) = var("COLLOQUY_BOT_NAME") {
        config.conversation.bot_name = bot;
    }
    if let Some(participant) = var("COLLOQUY_PARTICIPANT_ID") {
        config.conversation.participant_id = participant;
    }
    if let Some(id) = var("COLLOQUY_CONVERSATION_ID") {
        config.conversation.conversation_id = Some(id);
    }
    if let Some(level) = var("COLLOQUY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("COLLOQUY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
