use std::time::Duration;

use serde::Serialize;
use tendero_core::catalog::feed_for_source;
use tendero_core::config::{AppConfig, LoadOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["whatsapp_credentials", "human_agent_number", "llm_credentials", "catalog_fetch"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_whatsapp_credentials(&config));
            checks.push(check_agent_number(&config));
            checks.push(check_llm_credentials(&config));
            checks.push(check_catalog_fetch(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_whatsapp_credentials(config: &AppConfig) -> DoctorCheck {
    let missing = [
        ("whatsapp.access_token", config.whatsapp.access_token.is_none()),
        ("whatsapp.phone_number_id", config.whatsapp.phone_number_id.is_none()),
    ]
    .into_iter()
    .filter_map(|(key, absent)| absent.then_some(key))
    .collect::<Vec<_>>();

    if missing.is_empty() {
        DoctorCheck {
            name: "whatsapp_credentials",
            status: CheckStatus::Pass,
            details: "access token and sending number configured".to_string(),
        }
    } else {
        DoctorCheck {
            name: "whatsapp_credentials",
            status: CheckStatus::Fail,
            details: format!("missing {}; outbound messages will be skipped", missing.join(", ")),
        }
    }
}

fn check_agent_number(config: &AppConfig) -> DoctorCheck {
    match &config.whatsapp.human_agent_number {
        Some(number) => DoctorCheck {
            name: "human_agent_number",
            status: CheckStatus::Pass,
            details: format!("agent notifications go to {number}"),
        },
        None => DoctorCheck {
            name: "human_agent_number",
            status: CheckStatus::Fail,
            details: "whatsapp.human_agent_number unset; handoffs and receipts will not be relayed"
                .to_string(),
        },
    }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    if config.llm.api_key.is_some() {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!("model `{}` at {}", config.llm.model, config.llm.base_url),
        }
    } else {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: "llm.api_key unset; product questions will go unanswered".to_string(),
        }
    }
}

fn check_catalog_fetch(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "catalog_fetch",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let feed = feed_for_source(
        &config.catalog.source,
        config.catalog.delimiter_byte(),
        Duration::from_secs(config.catalog.timeout_secs),
    );
    match runtime.block_on(feed.fetch()) {
        Ok(products) if !products.is_empty() => DoctorCheck {
            name: "catalog_fetch",
            status: CheckStatus::Pass,
            details: format!("{} products from {}", products.len(), config.catalog.source),
        },
        Ok(_) => DoctorCheck {
            name: "catalog_fetch",
            status: CheckStatus::Fail,
            details: format!("{} returned no products with a name", config.catalog.source),
        },
        Err(error) => {
            DoctorCheck { name: "catalog_fetch", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
