use anyhow::{bail, Context, Result};
use ipenrich::config::GeoConfig;
use ipenrich::geo::{GeoReader, GeoRecord};
use serde_json::json;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli_utils::parse_address;

pub struct GeoArgs {
    /// `[DATABASE] ADDR...` as given on the command line
    pub args: Vec<String>,
    pub position: bool,
    pub country_long: bool,
    pub shared_name: Option<String>,
    pub json: bool,
    pub config: Option<GeoConfig>,
}

/// Split `[DATABASE] ADDR...`; the database falls back to the configured one
fn resolve_database(
    args: Vec<String>,
    configured: Option<PathBuf>,
) -> Result<(PathBuf, Vec<String>)> {
    let mut args = args.into_iter();
    let Some(first) = args.next() else {
        bail!("No addresses given");
    };

    if first.parse::<IpAddr>().is_ok() {
        let Some(database) = configured else {
            bail!("No database given; pass DATABASE or set geoip.ip2location_bin_file");
        };
        let mut addresses = vec![first];
        addresses.extend(args);
        return Ok((database, addresses));
    }

    let addresses: Vec<String> = args.collect();
    if addresses.is_empty() {
        bail!("No addresses given after database {}", first);
    }
    Ok((PathBuf::from(first), addresses))
}

pub fn cmd_geo(args: GeoArgs) -> Result<()> {
    // Without a configuration file the CLI maps privately
    let mut geo_config = args.config.unwrap_or(GeoConfig {
        shared_memory_name: None,
        ..GeoConfig::default()
    });

    let (database, addresses) =
        resolve_database(args.args, geo_config.ip2location_bin_file.take())?;
    geo_config.ip2location_bin_file = Some(database.clone());
    geo_config.show_position |= args.position;
    geo_config.show_country_long |= args.country_long;
    if let Some(name) = args.shared_name {
        geo_config.shared_memory_name = Some(name);
    }

    let mut reader = GeoReader::new();
    reader
        .open_config(&geo_config)
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let Some(db) = reader.database() else {
        bail!("Geo lookups are disabled in the configuration");
    };

    let mut results = Vec::with_capacity(addresses.len());
    for text in &addresses {
        let addr = parse_address(text)?;
        results.push((text.as_str(), db.lookup(addr)));
    }

    if args.json {
        let output: Vec<_> = results
            .iter()
            .map(|(address, record)| match record {
                Some(record) => {
                    let mut value = json!(record);
                    value["address"] = json!(address);
                    value["found"] = json!(true);
                    value
                }
                None => json!({ "address": address, "found": false }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (address, record) in &results {
            match record {
                Some(record) => print_record(address, record),
                None => println!("{}: not found", address),
            }
        }
    }

    if db.index_errors() > 0 {
        eprintln!(
            "Warning: {} out-of-bounds reads; the database may be truncated",
            db.index_errors()
        );
    }

    Ok(())
}

fn print_record(address: &str, record: &GeoRecord) {
    println!("{}", address);
    match (&record.country_short, &record.country_long) {
        (Some(short), Some(long)) => println!("  Country:   {} ({})", short, long),
        (Some(short), None) => println!("  Country:   {}", short),
        (None, Some(long)) => println!("  Country:   {}", long),
        (None, None) => {}
    }
    if let Some(region) = &record.region {
        println!("  Region:    {}", region);
    }
    if let Some(city) = &record.city {
        println!("  City:      {}", city);
    }
    if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
        println!("  Position:  {:.4}, {:.4}", lat, lon);
    }
}
