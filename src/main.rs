use adscope::{
    config::Config,
    fetch::SourceSpec,
    metrics::{classify, ClassificationRule, Metric},
    schema::CanonicalField,
    table::{export_to_path, ExportFormat, GroupKey, Summary},
    Pipeline, PipelineCache, PipelineError, PipelineOutput, UnifiedTable,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Client;
use std::{
    collections::BTreeSet, future::Future, path::PathBuf, process::ExitCode, sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status when no configured source produced data.
const EXIT_NO_DATA: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Merge ad-platform CSV exports and derive ROAS, CVR, CTR and CPC"
)]
struct Cli {
    /// YAML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Source as NAME=LOCATOR (URL or path). Repeatable; replaces configured sources.
    #[arg(short, long = "source", global = true)]
    sources: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, merge and print once.
    Run(RunArgs),
    /// Re-run on an interval, printing the summary each time.
    Watch {
        /// Seconds between refreshes.
        #[arg(long, default_value_t = 300)]
        interval: u64,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Only rows for this campaign. Repeatable.
    #[arg(long = "campaign")]
    campaigns: Vec<String>,

    /// How many of the newest rows to print.
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Also print totals per campaign or keyword.
    #[arg(long, value_enum)]
    group_by: Option<GroupBy>,

    /// Write the (filtered) unified table here.
    #[arg(long)]
    export: Option<PathBuf>,

    /// csv, json or parquet. Defaults to the export path's extension.
    #[arg(long)]
    format: Option<ExportFormat>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GroupBy {
    Campaign,
    Keyword,
}

impl From<GroupBy> for GroupKey {
    fn from(g: GroupBy) -> Self {
        match g {
            GroupBy::Campaign => GroupKey::Campaign,
            GroupBy::Keyword => GroupKey::Keyword,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,adscope=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let sources = resolve_sources(&cli.sources, &config)?;
    let aliases = Arc::new(config.alias_map()?);
    info!(sources = sources.len(), aliases = aliases.len(), "startup");

    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .gzip(true)
        .build()
        .context("building HTTP client")?;
    let pipeline = Pipeline::new(client, aliases);

    match cli.command {
        Command::Run(args) => run_once(&pipeline, &sources, &config, args).await,
        Command::Watch { interval } => watch(&pipeline, &sources, interval, ctrl_c()).await,
    }
}

fn resolve_sources(args: &[String], config: &Config) -> Result<Vec<SourceSpec>> {
    let sources = if args.is_empty() {
        config.sources.clone()
    } else {
        args.iter()
            .map(|a| SourceSpec::parse_arg(a).with_context(|| format!("--source `{}`", a)))
            .collect::<Result<Vec<_>>>()?
    };
    if sources.is_empty() {
        bail!("no sources configured: pass --source NAME=LOCATOR or a --config file with `sources`");
    }
    Ok(sources)
}

async fn run_once(
    pipeline: &Pipeline,
    sources: &[SourceSpec],
    config: &Config,
    args: RunArgs,
) -> Result<ExitCode> {
    let output = match pipeline.run(sources).await {
        Ok(output) => output,
        Err(e) => return Ok(report_no_data(&e)),
    };
    print_notices(&output);

    let table = if args.campaigns.is_empty() {
        output.table.clone()
    } else {
        let selected: BTreeSet<String> = args.campaigns.iter().cloned().collect();
        let known: BTreeSet<String> = output.table.campaigns().into_iter().collect();
        for missing in selected.difference(&known) {
            warn!(campaign = %missing, "no rows for campaign");
        }
        output.table.filter_campaigns(&selected)
    };

    println!("merged {} rows from {} source(s)", output.table.len(), output.table.sources().len());
    print_summary("total", &table.summary());
    if let Some(group) = args.group_by {
        for g in table.aggregate_by(group.into()) {
            print_summary(g.key.as_deref().unwrap_or("(none)"), &g.summary);
        }
    }
    print_rows(&table, args.limit, config.classification.as_ref());

    let export = match (&args.export, &config.export) {
        (Some(path), _) => Some((
            path.clone(),
            args.format.or_else(|| ExportFormat::from_path(path)).unwrap_or_default(),
        )),
        (None, Some(cfg)) => Some((cfg.path.clone(), args.format.unwrap_or(cfg.resolved_format()))),
        (None, None) => None,
    };
    if let Some((path, format)) = export {
        export_to_path(&table, format, &path)?;
        println!("exported {} rows to {}", table.len(), path.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Refresh every `interval` seconds until `shutdown` resolves. Shutdown is
/// observed mid-refresh too, so a hung fetch does not delay it.
async fn watch<F>(
    pipeline: &Pipeline,
    sources: &[SourceSpec],
    interval: u64,
    shutdown: F,
) -> Result<ExitCode>
where
    F: Future<Output = ()>,
{
    let cache = PipelineCache::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        let result = tokio::select! {
            _ = &mut shutdown => break,
            result = cache.refresh(pipeline, sources) => result,
        };
        match result {
            Ok(output) => {
                print_notices(&output);
                println!(
                    "merged {} rows from {} source(s)",
                    output.table.len(),
                    output.table.sources().len()
                );
                print_summary("total", &output.table.summary());
            }
            // Keep watching; a later tick may succeed.
            Err(e) => {
                report_no_data(&e);
            }
        }
    }
    info!("interrupted; stopping watch");
    Ok(ExitCode::SUCCESS)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c; watch runs until killed");
        std::future::pending::<()>().await;
    }
}

fn report_no_data(err: &PipelineError) -> ExitCode {
    error!(error = %err, "pipeline failed");
    eprintln!("{}", err);
    for failure in err.failures() {
        eprintln!("  - {}", failure);
    }
    ExitCode::from(EXIT_NO_DATA)
}

fn print_notices(output: &PipelineOutput) {
    for notice in &output.notices {
        eprintln!("skipped: {}", notice);
    }
    let c = &output.coercion;
    if !c.is_clean() {
        eprintln!(
            "note: {} unparseable numeric cell(s) zero-filled, {} date(s) unreadable",
            c.total_coerced(),
            c.unparsed_dates()
        );
    }
}

fn print_summary(label: &str, s: &Summary) {
    let mut line = format!(
        "{:<20} rows={} spend={:.0} revenue={:.0} orders={} clicks={} impressions={}",
        label, s.rows, s.spend, s.revenue, s.orders, s.clicks, s.impressions
    );
    for (metric, value) in &s.ratios {
        line.push_str(&format!(" {}={}", metric, format_metric(*metric, *value)));
    }
    println!("{}", line);
}

fn format_metric(metric: Metric, value: f64) -> String {
    if metric.is_percent() {
        format!("{:.2}%", value)
    } else {
        format!("{:.0}", value)
    }
}

fn print_rows(table: &UnifiedTable, limit: usize, rule: Option<&ClassificationRule>) {
    if limit == 0 || table.is_empty() {
        return;
    }
    let fields: Vec<CanonicalField> = table.fields().iter().copied().collect();
    let metrics: Vec<Metric> = table.metrics().iter().copied().collect();
    let graded = rule.filter(|r| table.metrics().contains(&r.metric()));

    let mut header: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    header.extend(metrics.iter().map(|m| m.to_string()));
    if graded.is_some() {
        header.push("grade".to_string());
    }
    println!("{}", header.join("\t"));

    for record in table.sorted_by_date_desc().records().iter().take(limit) {
        let mut cells: Vec<String> = fields
            .iter()
            .map(|&f| match f {
                CanonicalField::Date => record.date.map(|d| d.to_string()).unwrap_or_default(),
                CanonicalField::CampaignName | CanonicalField::Keyword => {
                    record.text(f).unwrap_or_default().to_string()
                }
                CanonicalField::Spend | CanonicalField::Revenue => {
                    format!("{:.0}", record.numeric(f))
                }
                _ => record.count(f).to_string(),
            })
            .collect();
        cells.extend(
            metrics
                .iter()
                .map(|&m| format_metric(m, record.metric(m).unwrap_or(0.0))),
        );
        if let Some(rule) = graded {
            cells.push(
                classify(record, rule)
                    .map(|g| g.to_string())
                    .unwrap_or_default(),
            );
        }
        println!("{}", cells.join("\t"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscope::{fetch::Locator, schema::ColumnAliasMap};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn watch_stops_during_a_hung_fetch() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let pipeline = Pipeline::new(Client::new(), Arc::new(ColumnAliasMap::default()));
        let sources = vec![SourceSpec::new(
            "hung",
            Locator::parse(&format!("http://{}/a.csv", addr)).unwrap(),
        )];
        let shutdown = tokio::time::sleep(Duration::from_millis(200));

        let code = tokio::time::timeout(
            Duration::from_secs(10),
            watch(&pipeline, &sources, 3600, shutdown),
        )
        .await
        .expect("watch should stop while the refresh is still pending")
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }
}
