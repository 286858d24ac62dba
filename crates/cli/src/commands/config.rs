use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tendero_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// One rendered setting: dotted key, display value, primary env var and an
/// optional legacy alias.
struct Setting {
    key: &'static str,
    value: String,
    env_key: &'static str,
    env_alias: Option<&'static str>,
}

impl Setting {
    fn new(key: &'static str, value: impl Into<String>, env_key: &'static str) -> Self {
        Self { key, value: value.into(), env_key, env_alias: None }
    }

    fn alias(mut self, env_alias: &'static str) -> Self {
        self.env_alias = Some(env_alias);
        self
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec![
        "effective config (source precedence: overrides > env > file > default):".to_string()
    ];
    for setting in settings(&config) {
        let source = field_source(
            setting.key,
            &[Some(setting.env_key), setting.env_alias],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(setting.key, &setting.value, source));
    }

    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "<unset>".to_string());

    vec![
        Setting::new(
            "server.bind_address",
            &config.server.bind_address,
            "TENDERO_SERVER_BIND_ADDRESS",
        ),
        Setting::new("server.port", config.server.port.to_string(), "TENDERO_SERVER_PORT")
            .alias("PORT"),
        Setting::new(
            "whatsapp.access_token",
            redact_secret(config.whatsapp.access_token.as_ref()),
            "TENDERO_WHATSAPP_ACCESS_TOKEN",
        ),
        Setting::new(
            "whatsapp.phone_number_id",
            optional(&config.whatsapp.phone_number_id),
            "TENDERO_WHATSAPP_PHONE_NUMBER_ID",
        ),
        Setting::new(
            "whatsapp.api_base_url",
            &config.whatsapp.api_base_url,
            "TENDERO_WHATSAPP_API_BASE_URL",
        ),
        Setting::new(
            "whatsapp.verify_token",
            redact_secret(Some(&config.whatsapp.verify_token)),
            "TENDERO_WHATSAPP_VERIFY_TOKEN",
        ),
        Setting::new(
            "whatsapp.human_agent_number",
            optional(&config.whatsapp.human_agent_number),
            "TENDERO_WHATSAPP_HUMAN_AGENT_NUMBER",
        ),
        Setting::new("catalog.source", &config.catalog.source, "TENDERO_CATALOG_SOURCE"),
        Setting::new(
            "catalog.delimiter",
            config.catalog.delimiter.to_string(),
            "TENDERO_CATALOG_DELIMITER",
        ),
        Setting::new(
            "catalog.refresh_interval_secs",
            config.catalog.refresh_interval_secs.to_string(),
            "TENDERO_CATALOG_REFRESH_INTERVAL_SECS",
        ),
        Setting::new(
            "catalog.storefront_url",
            &config.catalog.storefront_url,
            "TENDERO_CATALOG_STOREFRONT_URL",
        ),
        Setting::new(
            "ranking.strategy",
            format!("{:?}", config.ranking.strategy).to_lowercase(),
            "TENDERO_RANKING_STRATEGY",
        ),
        Setting::new("ranking.top_k", config.ranking.top_k.to_string(), "TENDERO_RANKING_TOP_K"),
        Setting::new("llm.base_url", &config.llm.base_url, "TENDERO_LLM_BASE_URL"),
        Setting::new(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            "TENDERO_LLM_API_KEY",
        )
        .alias("GROQ_API_KEY"),
        Setting::new("llm.model", &config.llm.model, "TENDERO_LLM_MODEL"),
        Setting::new(
            "embedding.base_url",
            optional(&config.embedding.base_url),
            "TENDERO_EMBEDDING_BASE_URL",
        ),
        Setting::new(
            "conversation.history_limit",
            config.conversation.history_limit.to_string(),
            "TENDERO_CONVERSATION_HISTORY_LIMIT",
        ),
        Setting::new(
            "policy.disclose_prices",
            config.policy.disclose_prices.to_string(),
            "TENDERO_POLICY_DISCLOSE_PRICES",
        ),
        Setting::new(
            "admin.token",
            redact_secret(config.admin.token.as_ref()),
            "TENDERO_ADMIN_TOKEN",
        ),
        Setting::new("logging.level", &config.logging.level, "TENDERO_LOGGING_LEVEL")
            .alias("TENDERO_LOG_LEVEL"),
        Setting::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            "TENDERO_LOGGING_FORMAT",
        )
        .alias("TENDERO_LOG_FORMAT"),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("tendero.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/tendero.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[Option<&str>],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys.iter().flatten() {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(_) => "<redacted>".to_string(),
        None => "<unset>".to_string(),
    }
}
