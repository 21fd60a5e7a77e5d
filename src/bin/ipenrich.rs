mod cli_utils;
mod commands;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use ipenrich::EnrichConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{cmd_check_update, cmd_dump, cmd_geo, cmd_inspect, cmd_test, GeoArgs, ListArgs};

#[derive(Parser)]
#[command(name = "ipenrich")]
#[command(
    about = "Geolocation and block list enrichment for IP addresses",
    long_about = "ipenrich - Geolocation and block list enrichment for IP addresses\n\n\
    Looks up IPv4 and IPv6 addresses in IP2Location-style binary databases and \n\
    checks them against the Spamhaus DROP and DROPv6 block lists.\n\n\
    Features:\n\
      • Memory-mapped geo databases, optionally shared between processes\n\
      • Country, region, city and position lookups\n\
      • Merged DROP / DROPv6 range matching\n\
      • Refresh checks for downloaded list files\n\n\
    Examples:\n\
      ipenrich geo IP2LOCATION-LITE-DB3.BIN 8.8.8.8 2a06:e480::1\n\
      ipenrich --config ipenrich.json geo 8.8.8.8\n\
      ipenrich inspect IP2LOCATION-LITE-DB3.BIN --json\n\
      ipenrich dnsbl test --drop drop.txt --dropv6 dropv6.txt 24.233.0.21\n\
      ipenrich dnsbl check-update --drop drop.txt --max-days 5"
)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up addresses in a geo database
    Geo {
        /// Geo database (.BIN) followed by the addresses to look up. The
        /// database may be left out when the configuration names one.
        #[arg(value_name = "[DATABASE] ADDR", required = true, num_args = 1..)]
        args: Vec<String>,

        /// Include latitude and longitude
        #[arg(long)]
        position: bool,

        /// Include the full country name
        #[arg(long)]
        country_long: bool,

        /// Map the database into the named shared region
        #[arg(long, value_name = "NAME")]
        shared_name: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show geo database header information
    Inspect {
        /// Path to the geo database (.BIN)
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Work with the DROP / DROPv6 block lists
    Dnsbl {
        #[command(subcommand)]
        command: DnsblCommands,
    },
}

#[derive(Subcommand)]
enum DnsblCommands {
    /// Check one address, or run the built-in samples
    Test {
        #[command(flatten)]
        lists: ListOpts,

        /// Address to check; omit to run the built-in samples
        #[arg(value_name = "ADDR")]
        address: Option<String>,
    },

    /// List every loaded entry
    Dump {
        #[command(flatten)]
        lists: ListOpts,
    },

    /// Report whether the list files are due for a refresh
    CheckUpdate {
        #[command(flatten)]
        lists: ListOpts,

        /// Days before a list file is due (overrides the configuration)
        #[arg(long, value_name = "N")]
        max_days: Option<u32>,

        /// Treat every existing file as expired
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
struct ListOpts {
    /// DROP list file
    #[arg(long, value_name = "FILE")]
    drop: Option<PathBuf>,

    /// DROPv6 list file
    #[arg(long, value_name = "FILE")]
    dropv6: Option<PathBuf>,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Option<EnrichConfig>> {
    match path {
        Some(path) => {
            let config = EnrichConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration: {}", path.display()))?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

fn list_args(lists: ListOpts, config: Option<&EnrichConfig>) -> ListArgs {
    let dnsbl = config.map(|c| c.dnsbl.clone()).unwrap_or_default();
    ListArgs {
        drop: lists.drop.or(dnsbl.drop_file.clone()),
        dropv6: lists.dropv6.or(dnsbl.dropv6_file.clone()),
        dnsbl,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Geo {
            args,
            position,
            country_long,
            shared_name,
            json,
        } => cmd_geo(GeoArgs {
            args,
            position,
            country_long,
            shared_name,
            json,
            config: config.map(|c| c.geoip),
        }),
        Commands::Inspect { database, json } => cmd_inspect(database, json),
        Commands::Dnsbl { command } => match command {
            DnsblCommands::Test { lists, address } => {
                cmd_test(list_args(lists, config.as_ref()), address)
            }
            DnsblCommands::Dump { lists } => cmd_dump(list_args(lists, config.as_ref())),
            DnsblCommands::CheckUpdate {
                lists,
                max_days,
                force,
            } => cmd_check_update(list_args(lists, config.as_ref()), max_days, force),
        },
    }
}
