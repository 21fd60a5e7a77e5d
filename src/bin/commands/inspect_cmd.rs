use anyhow::{Context, Result};
use ipenrich::geo::{Coverage, GeoDatabase, GeoOptions, Ipv6RowField};
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_number};

pub fn cmd_inspect(database: PathBuf, json_output: bool) -> Result<()> {
    let db = GeoDatabase::open(&database, &GeoOptions::default())
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let header = db.header();
    let coverage = db.coverage();
    let has_ipv4_index = header.ipv4_index != 0;
    let has_ipv6_index = header.ipv6_index != 0;

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "size": db.size(),
            "type": header.type_code,
            "columns": header.column_count,
            "date": db.date().to_string(),
            "coverage": coverage,
            "ipv4_rows": db.ipv4_row_count(),
            "ipv6_rows": db.ipv6_row_count(),
            "ipv6_row_field": header.ipv6_row_field(),
            "ipv4_index": has_ipv4_index,
            "ipv6_index": has_ipv6_index,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database: {}", database.display());
    println!("Size:     {}", format_bytes(db.size()));
    println!("Type:     {}", header.type_code);
    println!("Columns:  {}", header.column_count);
    println!("Date:     {}", db.date());
    println!();

    let coverage_str = match coverage {
        Coverage::Ipv4Only => "IPv4 only",
        Coverage::Ipv6Only => "IPv6 only",
        Coverage::Dual => "IPv4 and IPv6",
    };
    println!("Coverage: {}", coverage_str);
    println!("  IPv4 rows:  {}", format_number(db.ipv4_row_count() as usize));
    match header.ipv6_row_field() {
        Ipv6RowField::RowCount(n) => println!("  IPv6 rows:  {}", format_number(n as usize)),
        Ipv6RowField::VersionTag(version) => {
            println!("  IPv6 rows:  {} (version tag {:?})", db.ipv6_row_count(), version)
        }
    }
    println!();

    println!("Index tables:");
    println!("  IPv4:  {}", if has_ipv4_index { "✓ present" } else { "✗ absent" });
    println!("  IPv6:  {}", if has_ipv6_index { "✓ present" } else { "✗ absent" });

    Ok(())
}
