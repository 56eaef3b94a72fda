//! vaultctl: maintenance CLI for shardvault stores.
//!
//! Runs one command against the shard directory and exits:
//! `vaultctl [--config FILE] [--dir DIR] [--dimension N] COMMAND`
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`).

mod commands;
mod format;
mod parse;

use std::path::Path;
use std::process;
use std::sync::Arc;

use shardvault_core::{VaultError, VaultResult};
use shardvault_engine::{DocumentRepository, StoreConfig};
use shardvault_index::{ShardData, ShardSchema};
use shardvault_shard::{shard_file_name, ShardManager};
use shardvault_storage::{FileAdapter, LocalFileAdapter};
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_document, format_error, format_report, format_stats, OutputMode};
use parse::{global_options, matches_to_action, CliAction, GlobalOptions};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let opts = global_options(&matches);
    let mode = if opts.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(2);
        }
    };

    let exit_code = match run(action, &opts, mode).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    };
    process::exit(exit_code);
}

async fn run(action: CliAction, opts: &GlobalOptions, mode: OutputMode) -> VaultResult<String> {
    match &action {
        CliAction::InitConfig { path } => {
            let existed = path.exists();
            StoreConfig::write_default_if_missing(path)?;
            return Ok(if existed {
                format!("{} already exists, left unchanged", path.display())
            } else {
                format!("Wrote {}", path.display())
            });
        }
        CliAction::Reset { confirmed: false } => {
            return Err(VaultError::Config(
                "reset deletes every shard file; pass --yes to confirm".to_string(),
            ));
        }
        _ => {}
    }

    let repository = open_repository(opts).await?;
    match action {
        CliAction::Stats => Ok(format_stats(&repository.stats().await?, mode)),
        CliAction::Rebalance { count } => Ok(format_report(&repository.rebalance(count).await?, mode)),
        CliAction::AutoRebalance => match repository.auto_rebalance().await? {
            Some(report) => Ok(format_report(&report, mode)),
            None => Ok("Shard sizes within thresholds, nothing to do".to_string()),
        },
        CliAction::Reset { .. } => {
            repository.reset().await?;
            Ok("Store reset to one empty shard".to_string())
        }
        CliAction::Get { id } => match repository.get(&id).await? {
            Some(doc) => Ok(format_document(&doc, mode)),
            None => Err(VaultError::DocumentNotFound { id }),
        },
        CliAction::InitConfig { .. } => Ok(String::new()),
    }
}

async fn open_repository(opts: &GlobalOptions) -> VaultResult<DocumentRepository> {
    let mut config = match &opts.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &opts.dir {
        config.dir = dir.clone();
    }

    let fs: Arc<dyn FileAdapter> = Arc::new(LocalFileAdapter::new(std::env::current_dir()?));
    let dimension = match opts.dimension {
        Some(d) => d,
        None => detect_dimension(fs.as_ref(), &config.dir).await?,
    };
    let schema = ShardSchema::for_documents(dimension, config.metric, config.language.clone());
    let manager = ShardManager::open(fs, config.dir.clone(), schema, config.manager_options()).await?;
    Ok(DocumentRepository::new(manager).with_similarity_threshold(config.similarity_threshold))
}

/// Read the embedding width recorded in the first shard file
async fn detect_dimension(fs: &dyn FileAdapter, dir: &Path) -> VaultResult<usize> {
    let first = dir.join(shard_file_name(0));
    if !fs.exists(&first).await? {
        return Err(VaultError::Config(format!(
            "no shard files in '{}'; pass --dimension to create a store",
            dir.display()
        )));
    }
    let data = ShardData::decode(&fs.read(&first).await?)?;
    Ok(data.header.dimension_hint)
}
