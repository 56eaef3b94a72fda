//! ArgMatches → action translation.

use clap::ArgMatches;
use std::path::PathBuf;

/// A parsed CLI invocation
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    /// Per-shard statistics
    Stats,
    /// Rebalance to a fixed shard count
    Rebalance { count: usize },
    /// Rebalance if average shard size is out of bounds
    AutoRebalance,
    /// Delete all shards; refused without `confirmed`
    Reset { confirmed: bool },
    /// Print one document
    Get { id: String },
    /// Write the default config file
    InitConfig { path: PathBuf },
}

/// Store location and schema overrides from global flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub dimension: Option<usize>,
    pub json: bool,
}

pub fn global_options(matches: &ArgMatches) -> GlobalOptions {
    GlobalOptions {
        config: matches.get_one::<String>("config").map(PathBuf::from),
        dir: matches.get_one::<String>("dir").map(PathBuf::from),
        dimension: matches.get_one::<usize>("dimension").copied(),
        json: matches.get_flag("json"),
    }
}

pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("stats", _)) => Ok(CliAction::Stats),
        Some(("rebalance", sub)) => {
            let count = *sub
                .get_one::<usize>("count")
                .ok_or("rebalance requires a shard count")?;
            if count == 0 {
                return Err("shard count must be at least 1".to_string());
            }
            Ok(CliAction::Rebalance { count })
        }
        Some(("auto-rebalance", _)) => Ok(CliAction::AutoRebalance),
        Some(("reset", sub)) => Ok(CliAction::Reset {
            confirmed: sub.get_flag("yes"),
        }),
        Some(("get", sub)) => {
            let id = sub
                .get_one::<String>("id")
                .ok_or("get requires a document id")?;
            Ok(CliAction::Get { id: id.clone() })
        }
        Some(("init-config", sub)) => {
            let path = sub
                .get_one::<String>("path")
                .ok_or("init-config requires a path")?;
            Ok(CliAction::InitConfig {
                path: PathBuf::from(path),
            })
        }
        Some((other, _)) => Err(format!("unknown command '{}'", other)),
        None => Err("no command given".to_string()),
    }
}
