use anyhow::{bail, Context, Result};
use ipenrich::blocklist::{ListKind, RangeMatcher, RefreshReason};
use ipenrich::config::DnsblConfig;
use ipenrich::{AddressClassifier, IanaClassifier};
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::cli_utils::{format_number, format_system_time, parse_address};

/// Addresses known to be on the published lists, with their references
const SAMPLES: &[(&str, Option<&str>)] = &[
    ("192.219.208.2", Some("103496")),
    ("24.233.0.21", Some("210084")),
    ("8.8.8.8", None),
    ("193.25.48.3", Some("211796")),
    ("2a06:e480::1", Some("301771")),
    ("2a06:e480::ff", Some("301771")),
    ("2607:d100::1", Some("347495")),
];

/// List files resolved from the command line and the configuration
pub struct ListArgs {
    pub drop: Option<PathBuf>,
    pub dropv6: Option<PathBuf>,
    pub dnsbl: DnsblConfig,
}

impl ListArgs {
    fn load(&self) -> Result<RangeMatcher> {
        let config = DnsblConfig {
            drop_file: self.drop.clone(),
            dropv6_file: self.dropv6.clone(),
            ..self.dnsbl.clone()
        };
        RangeMatcher::load(&config).context("Failed to load block lists")
    }
}

pub fn cmd_test(lists: ListArgs, address: Option<String>) -> Result<()> {
    let matcher = lists.load()?;
    match address {
        Some(text) => test_one(&matcher, &text),
        None => test_samples(&matcher),
    }
}

fn test_one(matcher: &RangeMatcher, text: &str) -> Result<()> {
    let addr = parse_address(text)?;
    if let Some(remark) = IanaClassifier.special_remark(addr) {
        println!("Address: \"{}\" is special; {}.", addr, remark);
    } else if let Some(entry) = matcher.find(addr) {
        println!(
            "Address: \"{}\" is listed as SBL{} ({}).",
            addr, entry.reference, entry.kind
        );
    } else {
        println!("Address: \"{}\" is not listed in any block-list.", addr);
    }
    Ok(())
}

fn test_samples(matcher: &RangeMatcher) -> Result<()> {
    println!(
        "Testing {} sample addresses against {} entries:",
        SAMPLES.len(),
        format_number(matcher.len())
    );

    let mut passed = 0;
    for (text, expected) in SAMPLES {
        let addr: IpAddr = parse_address(text)?;
        let actual = matcher.is_listed(addr).map(|r| r.as_str());
        let outcome = if actual == *expected {
            passed += 1;
            "ok"
        } else {
            "FAILED"
        };
        let found = match actual {
            Some(reference) => format!("SBL{}", reference),
            None => "not listed".to_string(),
        };
        println!("  {:<15} -> {:<12} {}", text, found, outcome);
    }

    println!("{} of {} samples as expected", passed, SAMPLES.len());
    Ok(())
}

pub fn cmd_dump(lists: ListArgs) -> Result<()> {
    let matcher = lists.load()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    matcher.dump(&mut out).context("Failed to write listing")?;
    out.flush()?;
    Ok(())
}

pub fn cmd_check_update(lists: ListArgs, max_days: Option<u32>, force: bool) -> Result<()> {
    let mut dnsbl = lists.dnsbl.clone();
    if let Some(days) = max_days {
        dnsbl.max_days = days;
    }
    let policy = dnsbl.refresh_policy(force);

    let files = [
        (ListKind::Drop, &lists.drop, &dnsbl.drop_url),
        (ListKind::DropV6, &lists.dropv6, &dnsbl.dropv6_url),
    ];
    if files.iter().all(|(_, path, _)| path.is_none()) {
        bail!("No list files given; use --drop / --dropv6 or a configuration file");
    }

    let now = SystemTime::now();
    for (kind, path, url) in files {
        let Some(path) = path else {
            continue;
        };
        let reason = policy
            .check(path, now)
            .with_context(|| format!("Failed to check {}", path.display()))?;
        let status = match reason {
            RefreshReason::Missing => "due (missing)".to_string(),
            RefreshReason::Truncated => "due (empty)".to_string(),
            RefreshReason::Expired => "due (expired)".to_string(),
            RefreshReason::Fresh { next_due } => {
                format!("fresh until {}", format_system_time(next_due))
            }
        };
        println!("{:<7} {}: {}", kind.name(), path.display(), status);
        if reason.is_due() {
            println!("        fetch from {}", url);
        }
    }

    Ok(())
}
