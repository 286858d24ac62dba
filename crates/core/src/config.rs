use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::rules::IntentPhrases;
use crate::ranking::{RankingStrategy, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOP_K};

pub const DEFAULT_CATALOG_SOURCE: &str = "https://docs.google.com/spreadsheets/d/1rvPCWMBQrgUocN0W6ptPjULkSFiVpDONbVbf9IkepVg/export?format=csv";
pub const DEFAULT_STOREFRONT_URL: &str = "https://asoferru.mitiendanube.com";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub whatsapp: WhatsAppConfig,
    pub catalog: CatalogConfig,
    pub ranking: RankingConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub conversation: ConversationConfig,
    pub policy: PolicyConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
    pub phrases: IntentPhrases,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub access_token: Option<SecretString>,
    pub phone_number_id: Option<String>,
    pub api_base_url: String,
    pub verify_token: SecretString,
    /// Recipient of payment, handoff and shipping notifications.
    pub human_agent_number: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    /// `http(s)://` URL of a CSV export or a local CSV path.
    pub source: String,
    pub delimiter: char,
    /// Zero disables the periodic refresh; the catalog then loads at startup
    /// and on admin request only.
    pub refresh_interval_secs: u64,
    pub storefront_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RankingConfig {
    pub strategy: RankingStrategy,
    pub top_k: usize,
    pub similarity_threshold: f32,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub history_limit: usize,
    pub idle_ttl_secs: u64,
    pub max_users: usize,
}

#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub disclose_prices: bool,
    pub store_name: String,
    pub assistant_name: String,
    /// Phone number quoted to customers in canned replies, if any.
    pub contact_number: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct AdminConfig {
    pub token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub catalog_source: Option<String>,
    pub ranking_strategy: Option<RankingStrategy>,
    pub top_k: Option<usize>,
    pub disclose_prices: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            whatsapp: WhatsAppConfig {
                access_token: None,
                phone_number_id: None,
                api_base_url: "https://graph.facebook.com/v20.0".to_string(),
                verify_token: secret_value("asoferru-token".to_string()),
                human_agent_number: None,
                timeout_secs: 15,
            },
            catalog: CatalogConfig {
                source: DEFAULT_CATALOG_SOURCE.to_string(),
                delimiter: ',',
                refresh_interval_secs: 0,
                storefront_url: DEFAULT_STOREFRONT_URL.to_string(),
                timeout_secs: 20,
            },
            ranking: RankingConfig {
                strategy: RankingStrategy::Lexical,
                top_k: DEFAULT_TOP_K,
                similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            },
            llm: LlmConfig {
                base_url: "https://api.groq.com/openai/v1".to_string(),
                api_key: None,
                model: "llama-3.1-8b-instant".to_string(),
                timeout_secs: 30,
                temperature: None,
            },
            embedding: EmbeddingConfig {
                base_url: None,
                api_key: None,
                model: "text-embedding-3-small".to_string(),
                timeout_secs: 15,
            },
            conversation: ConversationConfig {
                history_limit: 6,
                idle_ttl_secs: 86_400,
                max_users: 10_000,
            },
            policy: PolicyConfig {
                disclose_prices: false,
                store_name: "ASOFERRU Urabá".to_string(),
                assistant_name: "Dayana".to_string(),
                contact_number: None,
            },
            admin: AdminConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            phrases: IntentPhrases::default(),
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl CatalogConfig {
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter).unwrap_or(b',')
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tendero.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.phrases = config.phrases.normalized();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(access_token) = whatsapp.access_token {
                self.whatsapp.access_token = Some(secret_value(access_token));
            }
            if let Some(phone_number_id) = whatsapp.phone_number_id {
                self.whatsapp.phone_number_id = Some(phone_number_id);
            }
            if let Some(api_base_url) = whatsapp.api_base_url {
                self.whatsapp.api_base_url = api_base_url;
            }
            if let Some(verify_token) = whatsapp.verify_token {
                self.whatsapp.verify_token = secret_value(verify_token);
            }
            if let Some(human_agent_number) = whatsapp.human_agent_number {
                self.whatsapp.human_agent_number = Some(human_agent_number);
            }
            if let Some(timeout_secs) = whatsapp.timeout_secs {
                self.whatsapp.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(source) = catalog.source {
                self.catalog.source = source;
            }
            if let Some(delimiter) = catalog.delimiter {
                self.catalog.delimiter = delimiter;
            }
            if let Some(refresh_interval_secs) = catalog.refresh_interval_secs {
                self.catalog.refresh_interval_secs = refresh_interval_secs;
            }
            if let Some(storefront_url) = catalog.storefront_url {
                self.catalog.storefront_url = storefront_url;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
        }

        if let Some(ranking) = patch.ranking {
            if let Some(strategy) = ranking.strategy {
                self.ranking.strategy = strategy;
            }
            if let Some(top_k) = ranking.top_k {
                self.ranking.top_k = top_k;
            }
            if let Some(similarity_threshold) = ranking.similarity_threshold {
                self.ranking.similarity_threshold = similarity_threshold;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = Some(temperature);
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = Some(base_url);
            }
            if let Some(api_key) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(api_key));
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(history_limit) = conversation.history_limit {
                self.conversation.history_limit = history_limit;
            }
            if let Some(idle_ttl_secs) = conversation.idle_ttl_secs {
                self.conversation.idle_ttl_secs = idle_ttl_secs;
            }
            if let Some(max_users) = conversation.max_users {
                self.conversation.max_users = max_users;
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(disclose_prices) = policy.disclose_prices {
                self.policy.disclose_prices = disclose_prices;
            }
            if let Some(store_name) = policy.store_name {
                self.policy.store_name = store_name;
            }
            if let Some(assistant_name) = policy.assistant_name {
                self.policy.assistant_name = assistant_name;
            }
            if let Some(contact_number) = policy.contact_number {
                self.policy.contact_number = Some(contact_number);
            }
        }

        if let Some(admin) = patch.admin {
            if let Some(token) = admin.token {
                self.admin.token = Some(secret_value(token));
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(phrases) = patch.phrases {
            let current = &mut self.phrases;
            let replace = |target: &mut Vec<String>, value: Option<Vec<String>>| {
                if let Some(value) = value {
                    *target = value;
                }
            };
            replace(&mut current.human_handoff, phrases.human_handoff);
            replace(&mut current.payment, phrases.payment);
            replace(&mut current.greeting, phrases.greeting);
            replace(&mut current.menu_request, phrases.menu_request);
            replace(&mut current.product_advisor, phrases.product_advisor);
            replace(&mut current.payments_option, phrases.payments_option);
            replace(&mut current.shipping_option, phrases.shipping_option);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TENDERO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TENDERO_SERVER_PORT") {
            self.server.port = parse_u16("TENDERO_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }
        if let Some(value) = read_env("TENDERO_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TENDERO_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDERO_WHATSAPP_ACCESS_TOKEN") {
            self.whatsapp.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("TENDERO_WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = Some(value);
        }
        if let Some(value) = read_env("TENDERO_WHATSAPP_API_BASE_URL") {
            self.whatsapp.api_base_url = value;
        }
        if let Some(value) = read_env("TENDERO_WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = secret_value(value);
        }
        if let Some(value) = read_env("TENDERO_WHATSAPP_HUMAN_AGENT_NUMBER") {
            self.whatsapp.human_agent_number = Some(value);
        }
        if let Some(value) = read_env("TENDERO_WHATSAPP_TIMEOUT_SECS") {
            self.whatsapp.timeout_secs = parse_u64("TENDERO_WHATSAPP_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDERO_CATALOG_SOURCE") {
            self.catalog.source = value;
        }
        if let Some(value) = read_env("TENDERO_CATALOG_DELIMITER") {
            self.catalog.delimiter = parse_char("TENDERO_CATALOG_DELIMITER", &value)?;
        }
        if let Some(value) = read_env("TENDERO_CATALOG_REFRESH_INTERVAL_SECS") {
            self.catalog.refresh_interval_secs =
                parse_u64("TENDERO_CATALOG_REFRESH_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("TENDERO_CATALOG_STOREFRONT_URL") {
            self.catalog.storefront_url = value;
        }
        if let Some(value) = read_env("TENDERO_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("TENDERO_CATALOG_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDERO_RANKING_STRATEGY") {
            self.ranking.strategy = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "TENDERO_RANKING_STRATEGY".to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = read_env("TENDERO_RANKING_TOP_K") {
            self.ranking.top_k = parse_usize("TENDERO_RANKING_TOP_K", &value)?;
        }
        if let Some(value) = read_env("TENDERO_RANKING_SIMILARITY_THRESHOLD") {
            self.ranking.similarity_threshold =
                parse_f32("TENDERO_RANKING_SIMILARITY_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("TENDERO_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("TENDERO_LLM_API_KEY").or_else(|| read_env("GROQ_API_KEY")) {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TENDERO_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TENDERO_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("TENDERO_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TENDERO_LLM_TEMPERATURE") {
            self.llm.temperature = Some(parse_f32("TENDERO_LLM_TEMPERATURE", &value)?);
        }

        if let Some(value) = read_env("TENDERO_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(value);
        }
        if let Some(value) = read_env("TENDERO_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TENDERO_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("TENDERO_EMBEDDING_TIMEOUT_SECS") {
            self.embedding.timeout_secs = parse_u64("TENDERO_EMBEDDING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDERO_CONVERSATION_HISTORY_LIMIT") {
            self.conversation.history_limit =
                parse_usize("TENDERO_CONVERSATION_HISTORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("TENDERO_CONVERSATION_IDLE_TTL_SECS") {
            self.conversation.idle_ttl_secs =
                parse_u64("TENDERO_CONVERSATION_IDLE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("TENDERO_CONVERSATION_MAX_USERS") {
            self.conversation.max_users = parse_usize("TENDERO_CONVERSATION_MAX_USERS", &value)?;
        }

        if let Some(value) = read_env("TENDERO_POLICY_DISCLOSE_PRICES") {
            self.policy.disclose_prices = parse_bool("TENDERO_POLICY_DISCLOSE_PRICES", &value)?;
        }
        if let Some(value) = read_env("TENDERO_POLICY_STORE_NAME") {
            self.policy.store_name = value;
        }
        if let Some(value) = read_env("TENDERO_POLICY_ASSISTANT_NAME") {
            self.policy.assistant_name = value;
        }
        if let Some(value) = read_env("TENDERO_POLICY_CONTACT_NUMBER") {
            self.policy.contact_number = Some(value);
        }

        if let Some(value) = read_env("TENDERO_ADMIN_TOKEN") {
            self.admin.token = Some(secret_value(value));
        }

        let log_level =
            read_env("TENDERO_LOGGING_LEVEL").or_else(|| read_env("TENDERO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TENDERO_LOGGING_FORMAT").or_else(|| read_env("TENDERO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(catalog_source) = overrides.catalog_source {
            self.catalog.source = catalog_source;
        }
        if let Some(ranking_strategy) = overrides.ranking_strategy {
            self.ranking.strategy = ranking_strategy;
        }
        if let Some(top_k) = overrides.top_k {
            self.ranking.top_k = top_k;
        }
        if let Some(disclose_prices) = overrides.disclose_prices {
            self.policy.disclose_prices = disclose_prices;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    /// Rejects malformed values. Absent credentials are accepted here and
    /// surface at use time instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_whatsapp(&self.whatsapp)?;
        validate_catalog(&self.catalog)?;
        validate_ranking(&self.ranking, &self.embedding)?;
        validate_llm(&self.llm)?;
        validate_conversation(&self.conversation)?;
        validate_policy(&self.policy)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tendero.toml"), PathBuf::from("config/tendero.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_timeout(key: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_whatsapp(whatsapp: &WhatsAppConfig) -> Result<(), ConfigError> {
    if !is_http_url(&whatsapp.api_base_url) {
        return Err(ConfigError::Validation(
            "whatsapp.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if whatsapp.verify_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "whatsapp.verify_token must not be empty; the platform echoes it during webhook setup"
                .to_string(),
        ));
    }

    validate_timeout("whatsapp.timeout_secs", whatsapp.timeout_secs)
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.source.trim().is_empty() {
        return Err(ConfigError::Validation(
            "catalog.source must be an http(s) URL or a local CSV path".to_string(),
        ));
    }

    let delimiter = catalog.delimiter;
    if !delimiter.is_ascii() || delimiter.is_ascii_alphanumeric() || matches!(delimiter, '"' | '\n')
    {
        return Err(ConfigError::Validation(format!(
            "catalog.delimiter `{delimiter}` must be a single ASCII separator such as `,` or `;`"
        )));
    }

    if !is_http_url(&catalog.storefront_url) {
        return Err(ConfigError::Validation(
            "catalog.storefront_url must start with http:// or https://".to_string(),
        ));
    }

    validate_timeout("catalog.timeout_secs", catalog.timeout_secs)
}

fn validate_ranking(ranking: &RankingConfig, embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    if ranking.top_k == 0 {
        return Err(ConfigError::Validation("ranking.top_k must be greater than zero".to_string()));
    }

    let threshold = ranking.similarity_threshold;
    if !threshold.is_finite() || !(0.0..1.0).contains(&threshold) {
        return Err(ConfigError::Validation(
            "ranking.similarity_threshold must be within [0, 1)".to_string(),
        ));
    }

    if ranking.strategy == RankingStrategy::Semantic {
        let base_url = embedding.base_url.as_deref().unwrap_or_default();
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "ranking.strategy = semantic requires embedding.base_url (http:// or https://)"
                    .to_string(),
            ));
        }
        if embedding.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ranking.strategy = semantic requires embedding.model".to_string(),
            ));
        }
        validate_timeout("embedding.timeout_secs", embedding.timeout_secs)?;
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(temperature) = llm.temperature {
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Validation(
                "llm.temperature must be within [0, 2]".to_string(),
            ));
        }
    }

    validate_timeout("llm.timeout_secs", llm.timeout_secs)
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.history_limit == 0 {
        return Err(ConfigError::Validation(
            "conversation.history_limit must be greater than zero".to_string(),
        ));
    }

    if conversation.idle_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "conversation.idle_ttl_secs must be greater than zero".to_string(),
        ));
    }

    if conversation.max_users == 0 {
        return Err(ConfigError::Validation(
            "conversation.max_users must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if policy.store_name.trim().is_empty() || policy.assistant_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "policy.store_name and policy.assistant_name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

fn parse_char(key: &str, value: &str) -> Result<char, ConfigError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(ch),
        _ => Err(invalid_override(key, value)),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    whatsapp: Option<WhatsAppPatch>,
    catalog: Option<CatalogPatch>,
    ranking: Option<RankingPatch>,
    llm: Option<LlmPatch>,
    embedding: Option<EmbeddingPatch>,
    conversation: Option<ConversationPatch>,
    policy: Option<PolicyPatch>,
    admin: Option<AdminPatch>,
    logging: Option<LoggingPatch>,
    phrases: Option<PhrasesPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppPatch {
    access_token: Option<String>,
    phone_number_id: Option<String>,
    api_base_url: Option<String>,
    verify_token: Option<String>,
    human_agent_number: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    source: Option<String>,
    delimiter: Option<char>,
    refresh_interval_secs: Option<u64>,
    storefront_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RankingPatch {
    strategy: Option<RankingStrategy>,
    top_k: Option<usize>,
    similarity_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    history_limit: Option<usize>,
    idle_ttl_secs: Option<u64>,
    max_users: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    disclose_prices: Option<bool>,
    store_name: Option<String>,
    assistant_name: Option<String>,
    contact_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminPatch {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct PhrasesPatch {
    human_handoff: Option<Vec<String>>,
    payment: Option<Vec<String>>,
    greeting: Option<Vec<String>>,
    menu_request: Option<Vec<String>>,
    product_advisor: Option<Vec<String>>,
    payments_option: Option<Vec<String>>,
    shipping_option: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::ranking::RankingStrategy;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> Result<std::path::PathBuf, String> {
        let path = dir.path().join("tendero.toml");
        fs::write(&path, body).map_err(|err| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn defaults_load_without_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.port == 3000, "default port should be 3000")?;
        ensure(config.ranking.top_k == 3, "default top_k should be 3")?;
        ensure(config.conversation.history_limit == 6, "default history limit should be 6")?;
        ensure(!config.policy.disclose_prices, "prices should not be disclosed by default")?;
        ensure(config.whatsapp.access_token.is_none(), "access token should be absent")?;
        ensure(
            config.whatsapp.verify_token.expose_secret() == "asoferru-token",
            "default verify token should be set",
        )?;
        ensure(config.llm.model == "llama-3.1-8b-instant", "default model should be set")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_WHATSAPP_TOKEN", "EAAG-from-env");
        env::set_var("TEST_AGENT_NUMBER", "573001112233");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[whatsapp]
access_token = "${TEST_WHATSAPP_TOKEN}"
human_agent_number = "${TEST_AGENT_NUMBER}"

[catalog]
source = "catalog/productos.csv"
delimiter = ";"
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .whatsapp
                    .access_token
                    .as_ref()
                    .is_some_and(|token| token.expose_secret() == "EAAG-from-env"),
                "access token should be interpolated from environment",
            )?;
            ensure(
                config.whatsapp.human_agent_number.as_deref() == Some("573001112233"),
                "agent number should be interpolated from environment",
            )?;
            ensure(config.catalog.delimiter_byte() == b';', "delimiter should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_WHATSAPP_TOKEN", "TEST_AGENT_NUMBER"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, "[llm]\napi_key = \"${TENDERO_TEST_NOT_SET}\"\n")?;

        let error =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(error, Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "TENDERO_TEST_NOT_SET"),
            "missing interpolation variable should be named",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDERO_LOG_LEVEL", "warn");
        env::set_var("TENDERO_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["TENDERO_LOG_LEVEL", "TENDERO_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDERO_CATALOG_SOURCE", "https://env.example/catalog.csv");
        env::set_var("TENDERO_RANKING_TOP_K", "5");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[catalog]
source = "https://file.example/catalog.csv"

[ranking]
top_k = 4

[logging]
level = "warn"
"#,
            )?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    top_k: Some(2),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.ranking.top_k == 2, "override top_k should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.catalog.source == "https://env.example/catalog.csv",
                "env catalog source should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["TENDERO_CATALOG_SOURCE", "TENDERO_RANKING_TOP_K"]);
        result
    }

    #[test]
    fn invalid_env_override_names_the_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDERO_CONVERSATION_HISTORY_LIMIT", "six");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "TENDERO_CONVERSATION_HISTORY_LIMIT",
                "error should name the offending variable",
            ),
            _ => Err("expected an invalid env override error".to_string()),
        };

        clear_vars(&["TENDERO_CONVERSATION_HISTORY_LIMIT"]);
        result
    }

    #[test]
    fn semantic_strategy_requires_embedding_endpoint() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                ranking_strategy: Some(RankingStrategy::Semantic),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        ensure(
            matches!(
                error,
                Err(ConfigError::Validation(ref message)) if message.contains("embedding.base_url")
            ),
            "validation failure should mention embedding.base_url",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let mut config = AppConfig::default();
        config.ranking.top_k = 0;
        let top_k = config.validate();

        let mut config = AppConfig::default();
        config.ranking.similarity_threshold = 1.5;
        let threshold = config.validate();

        let mut config = AppConfig::default();
        config.ranking.similarity_threshold = -0.2;
        let negative_threshold = config.validate();

        let mut config = AppConfig::default();
        config.ranking.similarity_threshold = 0.0;
        let zero_threshold = config.validate();

        let mut config = AppConfig::default();
        config.catalog.storefront_url = "asoferru.mitiendanube.com".to_string();
        let storefront = config.validate();

        ensure(
            matches!(top_k, Err(ConfigError::Validation(ref message)) if message.contains("top_k")),
            "zero top_k should be rejected",
        )?;
        ensure(
            matches!(
                threshold,
                Err(ConfigError::Validation(ref message)) if message.contains("similarity_threshold")
            ),
            "out of range threshold should be rejected",
        )?;
        ensure(
            matches!(
                negative_threshold,
                Err(ConfigError::Validation(ref message)) if message.contains("similarity_threshold")
            ),
            "negative threshold should be rejected",
        )?;
        ensure(zero_threshold.is_ok(), "zero threshold should be accepted")?;
        ensure(
            matches!(
                storefront,
                Err(ConfigError::Validation(ref message)) if message.contains("storefront_url")
            ),
            "storefront url without scheme should be rejected",
        )
    }

    #[test]
    fn configured_phrases_replace_defaults_and_are_normalized() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[phrases]
human_handoff = ["Hablar con Dayana", "  ASESORÍA "]
"#,
        )?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        ensure(
            config.phrases.human_handoff == vec!["hablar con dayana", "asesoria"],
            "handoff phrases should be replaced and folded",
        )?;
        ensure(!config.phrases.payment.is_empty(), "untouched lists should keep their defaults")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TENDERO_WHATSAPP_ACCESS_TOKEN", "EAAG-secret-value");
        env::set_var("TENDERO_ADMIN_TOKEN", "admin-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("EAAG-secret-value"),
                "debug output should not contain the access token",
            )?;
            ensure(
                !debug.contains("admin-secret-value"),
                "debug output should not contain the admin token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["TENDERO_WHATSAPP_ACCESS_TOKEN", "TENDERO_ADMIN_TOKEN"]);
        result
    }
}
