//! Repo command - inspect the identity repository

use anyhow::{Context, Result, bail};
use crosspost_adapters::repository::JsonFileRepository;
use crosspost_domain::{PostId, PostIdRepository};
use std::path::PathBuf;

use crate::args::{RepoArgs, RepoCommands};
use crate::config::AppConfig;

pub async fn execute(args: RepoArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let repository = JsonFileRepository::load(&config.general.storage_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open storage: {}",
                config.general.storage_path.display()
            )
        })?;

    match args.command {
        RepoCommands::Find { system, id, json } => find(&repository, system, id, json).await,
        RepoCommands::Stats => stats(&repository).await,
    }
}

async fn find(repository: &JsonFileRepository, system: String, id: String, json: bool) -> Result<()> {
    let criteria = PostId::new(id, system);
    let Some(ids) = repository
        .find(&criteria)
        .await
        .context("Failed to query repository")?
    else {
        bail!("No record found for {}", criteria);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else {
        for id in &ids {
            println!("{}", id);
        }
    }

    Ok(())
}

async fn stats(repository: &JsonFileRepository) -> Result<()> {
    let records = repository
        .record_count()
        .await
        .context("Failed to count records")?;

    println!("Storage: {}", repository.path().display());
    println!("Logical posts: {}", records);
    for (system, count) in repository.system_counts().await {
        println!("  {}: {}", system, count);
    }

    Ok(())
}
