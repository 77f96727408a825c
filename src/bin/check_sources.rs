//! Fetch and normalize each configured source on its own, reporting what the
//! alias map made of its headers.

use adscope::{
    config::Config,
    fetch::{fetch_source, SourceSpec},
    process::{clean, normalize, CoercionReport},
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Client;
use std::{path::PathBuf, process::ExitCode};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Check each source's headers against the alias map")]
struct Args {
    /// YAML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source as NAME=LOCATOR. Repeatable; replaces configured sources.
    #[arg(short, long = "source")]
    sources: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let sources: Vec<SourceSpec> = if args.sources.is_empty() {
        config.sources.clone()
    } else {
        args.sources
            .iter()
            .map(|a| SourceSpec::parse_arg(a))
            .collect::<Result<_>>()?
    };
    if sources.is_empty() {
        bail!("no sources to check");
    }
    let aliases = config.alias_map().context("building alias map")?;
    let client = Client::new();

    let mut ok = 0usize;
    for spec in &sources {
        println!("== {} ({})", spec.name, spec.locator);
        let raw = match fetch_source(&client, spec).await {
            Ok(raw) => raw,
            Err(e) => {
                println!("   FAILED  {}", e);
                continue;
            }
        };
        println!("   raw headers:        {:?}", raw.headers);
        println!("   rows:               {}", raw.len());

        match normalize(&spec.name, raw, &aliases) {
            Ok(table) => {
                println!("   normalized headers: {:?}", table.headers);
                let mut report = CoercionReport::default();
                let cleaned = clean(&table, &mut report);
                let fields: Vec<&str> = cleaned.fields.iter().map(|f| f.name()).collect();
                println!("   canonical fields:   {:?}", fields);
                println!(
                    "   OK  coerced={} unparsed_dates={}",
                    report.total_coerced(),
                    report.unparsed_dates()
                );
                ok += 1;
            }
            Err(e) => println!("   FAILED  {}", e),
        }
    }

    info!(ok, total = sources.len(), "checked sources");
    Ok(if ok == sources.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
