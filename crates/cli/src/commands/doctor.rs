//! Doctor command - validate configuration and show status

use anyhow::Result;
use crosspost_adapters::repository::JsonFileRepository;
use crosspost_domain::{IgnoreTag, PostIdRepository};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    storage: CheckResult,
    ignore_tag: CheckResult,
    channels: Vec<ChannelCheck>,
    overall: String,
}

#[derive(Debug, Serialize)]
struct ChannelCheck {
    name: &'static str,
    #[serde(flatten)]
    result: CheckResult,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        storage: CheckResult::error("Not checked"),
        ignore_tag: CheckResult::error("Not checked"),
        channels: vec![],
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.storage = check_storage(&config.general.storage_path).await;
        report.ignore_tag = check_ignore_tag(&config.general.ignore_tag);
        report.channels = check_channels(config);
    }

    let checks = [&report.config, &report.storage, &report.ignore_tag]
        .into_iter()
        .chain(report.channels.iter().map(|c| &c.result))
        .collect::<Vec<_>>();

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_storage(path: &Path) -> CheckResult {
    let repository = match JsonFileRepository::load(path).await {
        Ok(repository) => repository,
        Err(e) => return CheckResult::error(format!("Storage unusable: {}", e)),
    };

    let records = match repository.record_count().await {
        Ok(records) => records,
        Err(e) => return CheckResult::error(format!("Storage unusable: {}", e)),
    };

    let systems = repository.system_counts().await;
    let result = if path.exists() {
        CheckResult::ok(format!("{}: {} records", path.display(), records))
    } else {
        CheckResult::warn(format!(
            "{} does not exist yet, it will be created on first delivery",
            path.display()
        ))
    };

    result.with_details(serde_json::json!({
        "path": path.display().to_string(),
        "records": records,
        "systems": systems
            .into_iter()
            .map(|(system, count)| serde_json::json!({"system": system, "records": count}))
            .collect::<Vec<_>>(),
    }))
}

fn check_ignore_tag(tag: &str) -> CheckResult {
    if tag.trim().is_empty() {
        return CheckResult::error("Ignore tag is empty");
    }

    match IgnoreTag::new(tag) {
        Ok(_) => CheckResult::ok(format!("Ignore tag: {}", tag)),
        Err(e) => CheckResult::error(format!("Invalid ignore tag {}: {}", tag, e)),
    }
}

fn check_channels(config: &AppConfig) -> Vec<ChannelCheck> {
    let vk_r = &config.vk.retriever;
    let vk_s = &config.vk.sender;
    let tg_r = &config.telegram.retriever;
    let tg_s = &config.telegram.sender;
    let fb_r = &config.facebook.retriever;
    let fb_s = &config.facebook.sender;

    let checks = [
        ("vk_retriever", vk_r.enabled, non_zero(vk_r.group_id), vk_r.token_env.as_str()),
        ("vk_sender", vk_s.enabled, non_zero(vk_s.group_id), vk_s.token_env.as_str()),
        ("telegram_retriever", tg_r.enabled, non_empty(&tg_r.chat_id), tg_r.token_env.as_str()),
        ("telegram_sender", tg_s.enabled, non_empty(&tg_s.chat_id), tg_s.token_env.as_str()),
        ("facebook_retriever", fb_r.enabled, non_empty(&fb_r.page_id), fb_r.token_env.as_str()),
        ("facebook_sender", fb_s.enabled, non_empty(&fb_s.page_id), fb_s.token_env.as_str()),
    ];

    checks
        .into_iter()
        .map(|(name, enabled, target, token_env)| ChannelCheck {
            name,
            result: check_channel(enabled, target, token_env),
        })
        .collect()
}

fn non_zero(id: i64) -> Option<String> {
    (id != 0).then(|| id.to_string())
}

fn non_empty(id: &str) -> Option<String> {
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn check_channel(enabled: bool, target: Option<String>, token_env: &str) -> CheckResult {
    if !enabled {
        return CheckResult::ok("Disabled");
    }

    let Some(target) = target else {
        return CheckResult::error("Enabled but no channel id configured");
    };

    if token_env.is_empty() {
        return CheckResult::error(format!("Channel {}: no token env var configured", target));
    }

    // Only presence is reported, never the value
    match std::env::var(token_env) {
        Ok(val) if !val.trim().is_empty() => {
            CheckResult::ok(format!("Channel {}, token: {} (set)", target, token_env))
        }
        _ => CheckResult::error(format!("Channel {}, token: {} (not set)", target, token_env)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("crosspost Doctor Report");
    println!("=======================");
    println!();

    print_check("Config", &report.config);
    print_check("Storage", &report.storage);
    print_check("Ignore tag", &report.ignore_tag);
    for channel in &report.channels {
        print_check(channel.name, &channel.result);
    }

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall != "error" {
        println!();
        println!("Ready to run! Try: crosspost sync --dry-run");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
