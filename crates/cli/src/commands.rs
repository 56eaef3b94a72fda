//! Clap command tree definition.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("vaultctl")
        .about("Maintenance tool for shardvault stores")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("Path to shardvault.toml (default: built-in settings)")
                .global(true),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .help("Shard directory, overrides the config file")
                .global(true),
        )
        .arg(
            Arg::new("dimension")
                .long("dimension")
                .help("Embedding width (default: read from the first shard file)")
                .value_parser(value_parser!(usize))
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_stats())
        .subcommand(build_rebalance())
        .subcommand(build_auto_rebalance())
        .subcommand(build_reset())
        .subcommand(build_get())
        .subcommand(build_init_config())
}

fn build_stats() -> Command {
    Command::new("stats").about("Show per-shard document counts and file sizes")
}

fn build_rebalance() -> Command {
    Command::new("rebalance")
        .about("Redistribute documents over a new number of shards")
        .arg(
            Arg::new("count")
                .required(true)
                .value_parser(value_parser!(usize))
                .help("Target shard count"),
        )
}

fn build_auto_rebalance() -> Command {
    Command::new("auto-rebalance").about("Grow or shrink the shard count if sizes are out of bounds")
}

fn build_reset() -> Command {
    Command::new("reset")
        .about("Delete every shard and start over with one empty shard")
        .arg(
            Arg::new("yes")
                .long("yes")
                .action(ArgAction::SetTrue)
                .help("Confirm deletion"),
        )
}

fn build_get() -> Command {
    Command::new("get")
        .about("Print a document by id")
        .arg(Arg::new("id").required(true).help("Document id"))
}

fn build_init_config() -> Command {
    Command::new("init-config")
        .about("Write a commented default config file if none exists")
        .arg(
            Arg::new("path")
                .default_value(shardvault_engine::CONFIG_FILE_NAME)
                .help("Where to write the file"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_rebalance_requires_count() {
        assert!(build_cli().try_get_matches_from(["vaultctl", "rebalance"]).is_err());
        let m = build_cli()
            .try_get_matches_from(["vaultctl", "rebalance", "4"])
            .unwrap();
        let (_, sub) = m.subcommand().unwrap();
        assert_eq!(sub.get_one::<usize>("count"), Some(&4));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let m = build_cli()
            .try_get_matches_from(["vaultctl", "stats", "--dir", "notes/.shardvault", "--dimension", "384"])
            .unwrap();
        assert_eq!(m.get_one::<String>("dir").map(String::as_str), Some("notes/.shardvault"));
        assert_eq!(m.get_one::<usize>("dimension"), Some(&384));
    }
}
