//! Sync command - wire channels and run synchronization passes

use anyhow::{Context, Result};
use crosspost_adapters::{
    facebook::{FacebookRetriever, FacebookRetrieverConfig, FacebookSender, FacebookSenderConfig},
    repository::JsonFileRepository,
    telegram::{TelegramRetriever, TelegramRetrieverConfig, TelegramSender, TelegramSenderConfig},
    vk::{PageTypeCache, VkRetriever, VkRetrieverConfig, VkSender, VkSenderConfig},
};
use crosspost_domain::{
    IgnoreTag, PassReport, Retriever, Sender,
    usecases::{SuccessHook, SyncConfig, Synchronizer},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::interval;

use crate::args::SyncArgs;
use crate::config::{AppConfig, load_secret};

pub const VK_SYSTEM: &str = "vk";
pub const TELEGRAM_SYSTEM: &str = "tg";
pub const FACEBOOK_SYSTEM: &str = "fb";

pub async fn execute(args: SyncArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let dry_run = args.dry_run || config.general.dry_run;

    let repository = Arc::new(
        JsonFileRepository::load(&config.general.storage_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open storage: {}",
                    config.general.storage_path.display()
                )
            })?,
    );
    let hook = Arc::new(SuccessHook::new(repository.clone()));

    let retrievers = build_retrievers(&config)?;
    let senders = build_senders(&config, hook)?;

    if retrievers.is_empty() {
        tracing::warn!("No retrievers enabled, nothing to synchronize");
    }

    tracing::info!(
        dry_run,
        watch = args.watch,
        storage = %config.general.storage_path.display(),
        sources = ?retrievers.iter().map(|r| r.system_name().to_string()).collect::<Vec<_>>(),
        destinations = ?senders.iter().map(|s| s.system_name().to_string()).collect::<Vec<_>>(),
        "Starting crosspost sync"
    );

    let synchronizer = Synchronizer::new(retrievers, senders, repository, SyncConfig { dry_run });

    if !args.watch {
        let report = synchronizer.run_pass().await;
        print_report(&report, dry_run);
        return Ok(());
    }

    let mut ticker = interval(config.general.poll_interval());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = synchronizer.run_pass().await;
                print_report(&report, dry_run);
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}

fn build_retrievers(config: &AppConfig) -> Result<Vec<Arc<dyn Retriever>>> {
    let general = &config.general;
    let ignore_tag = IgnoreTag::new(&general.ignore_tag)
        .with_context(|| format!("Invalid ignore tag: {}", general.ignore_tag))?;
    let mut retrievers: Vec<Arc<dyn Retriever>> = Vec::new();

    let vk = &config.vk.retriever;
    if vk.enabled {
        let token = load_secret(&vk.token_env, "vk retriever")?;
        let mut vk_config = VkRetrieverConfig::new(vk.group_id, ignore_tag.clone());
        vk_config.item_count = general.item_count;
        vk_config.exclude_post_ids = vk.exclude_post_ids.clone();
        vk_config.timeout = general.request_timeout();
        retrievers.push(Arc::new(VkRetriever::new(token, vk_config, VK_SYSTEM)));
    }

    let telegram = &config.telegram.retriever;
    if telegram.enabled {
        let token = load_secret(&telegram.token_env, "telegram retriever")?;
        let tg_config = TelegramRetrieverConfig {
            chat_id: telegram.chat_id.clone(),
            item_count: general.item_count,
            ignore_tag: ignore_tag.clone(),
            timeout: general.request_timeout(),
        };
        retrievers.push(Arc::new(TelegramRetriever::new(
            token,
            tg_config,
            TELEGRAM_SYSTEM,
        )));
    }

    let facebook = &config.facebook.retriever;
    if facebook.enabled {
        let token = load_secret(&facebook.token_env, "facebook retriever")?;
        let mut fb_config = FacebookRetrieverConfig::new(facebook.page_id.clone(), ignore_tag);
        fb_config.item_count = general.item_count;
        fb_config.timeout = general.request_timeout();
        retrievers.push(Arc::new(FacebookRetriever::new(
            token,
            fb_config,
            FACEBOOK_SYSTEM,
        )));
    }

    Ok(retrievers)
}

fn build_senders(config: &AppConfig, hook: Arc<SuccessHook>) -> Result<Vec<Arc<dyn Sender>>> {
    let timeout = config.general.request_timeout();
    let mut senders: Vec<Arc<dyn Sender>> = Vec::new();

    let vk = &config.vk.sender;
    if vk.enabled {
        let token = load_secret(&vk.token_env, "vk sender")?;
        let mut vk_config = VkSenderConfig::new(vk.group_id);
        vk_config.timeout = timeout;
        senders.push(Arc::new(VkSender::new(
            token,
            vk_config,
            VK_SYSTEM,
            hook.clone(),
            Arc::new(PageTypeCache::new()),
        )));
    }

    let telegram = &config.telegram.sender;
    if telegram.enabled {
        let token = load_secret(&telegram.token_env, "telegram sender")?;
        let tg_config = TelegramSenderConfig {
            chat_id: telegram.chat_id.clone(),
            enable_notification: telegram.enable_notification,
            excluded_author: telegram.excluded_author.clone(),
            timeout,
        };
        senders.push(Arc::new(TelegramSender::new(
            token,
            tg_config,
            TELEGRAM_SYSTEM,
            hook.clone(),
        )));
    }

    let facebook = &config.facebook.sender;
    if facebook.enabled {
        let token = load_secret(&facebook.token_env, "facebook sender")?;
        let mut fb_config = FacebookSenderConfig::new(facebook.page_id.clone());
        fb_config.timeout = timeout;
        senders.push(Arc::new(FacebookSender::new(
            token,
            fb_config,
            FACEBOOK_SYSTEM,
            hook,
        )));
    }

    Ok(senders)
}

fn print_report(report: &PassReport, dry_run: bool) {
    let prefix = if dry_run { "[DRY RUN] " } else { "" };
    println!(
        "{}Pass complete: retrieved {}, delivered {}, skipped {}, failed {}, planned {}",
        prefix,
        report.retrieved,
        report.delivered,
        report.skipped,
        report.failed,
        report.planned
    );
    if !report.failed_sources.is_empty() {
        println!("Failed sources: {}", report.failed_sources.join(", "));
    }
}
