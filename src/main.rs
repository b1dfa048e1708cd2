use clap::{Parser, ValueEnum};
use kube_sanitize::client::{KubeFetcher, Lister};
use kube_sanitize::config::ScanConfig;
use kube_sanitize::report::{diff, DiffReport, ReportStore};
use kube_sanitize::scan::Scanner;
use kube_sanitize::tally::Report;
use kube_sanitize::{Outcome, Severity};
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(name = "kube-sanitize", version, about = "Scans a Kubernetes cluster and scores its configuration and health")]
struct Cli {
    /// Kubeconfig context to scan (defaults to the current context)
    #[arg(long)]
    context: Option<String>,

    /// Restrict the scan to one namespace
    #[arg(short, long)]
    namespace: Option<String>,

    /// Scan configuration file (YAML)
    #[arg(short, long, env = "KUBE_SANITIZE_CONFIG")]
    config: Option<PathBuf>,

    /// Persist the report snapshot and prune old ones
    #[arg(long)]
    save: bool,

    /// Diff this scan against the previous saved snapshot (implies --save)
    #[arg(long)]
    diff: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Output::Text)]
    output: Output,

    /// Hide issues below this severity in text output
    #[arg(long, value_parser = parse_severity)]
    min_severity: Option<Severity>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Text,
    Yaml,
    Json,
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(s).ok_or_else(|| format!("unknown severity `{}`", s))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    if let Some(namespace) = &cli.namespace {
        config = config.with_namespace(namespace);
    }

    let fetcher = match &cli.context {
        Some(context) => KubeFetcher::with_context(context).await?,
        None => KubeFetcher::new().await?,
    };
    let scanner = Scanner::new(Lister::new(fetcher, config.clone()));
    let report = scanner.scan().await;

    if cli.save || cli.diff {
        let store = ReportStore::open_default()?;
        let path = store.save(&report)?;
        log::info!("Saved report to {}", path.display());
        store.prune(&report.cluster, config.retention)?;

        if cli.diff {
            match store.last_two(&report.cluster)? {
                Some((previous, latest)) => print_diff(&diff(&previous, &latest)),
                None => eprintln!("No previous snapshot to diff against"),
            }
        }
    }

    match cli.output {
        Output::Text => print_report(&report, cli.min_severity),
        Output::Yaml => print!("{}", serde_yaml::to_string(&report)?),
        Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    let failed = config
        .fail_level
        .is_some_and(|level| report.max_severity() >= level);
    Ok(if failed { 1 } else { 0 })
}

fn print_report(report: &Report, min_severity: Option<Severity>) {
    println!("Cluster: {}", report.cluster);
    println!("Score:   {} ({})", report.score, report.grade);
    println!();

    for section in &report.sections {
        if !section.tally.valid {
            println!("{:<26} skipped", section.title);
            continue;
        }
        println!(
            "{:<26} {:>3} ({})  ok:{} info:{} warn:{} error:{}",
            section.title,
            section.tally.score,
            section.tally.grade(),
            section.tally.count(Severity::Ok),
            section.tally.count(Severity::Info),
            section.tally.count(Severity::Warn),
            section.tally.count(Severity::Error),
        );
        print_outcome(&section.outcome, min_severity.unwrap_or(Severity::Info));
    }

    if !report.errors.is_empty() {
        println!();
        println!("Scan errors:");
        for error in &report.errors {
            println!("  {}", error);
        }
    }
}

fn print_outcome(outcome: &Outcome, min_severity: Severity) {
    for (id, issues) in outcome.iter() {
        for issue in issues.iter().filter(|i| i.severity >= min_severity) {
            println!("  [{}] {}: {}", issue.severity, id, issue.message);
            for (sub_id, sub_issues) in issue.sub_issues.iter() {
                for sub in sub_issues.iter().filter(|i| i.severity >= min_severity) {
                    println!("    [{}] {}: {}", sub.severity, sub_id, sub.message);
                }
            }
        }
    }
}

fn print_diff(report: &DiffReport) {
    println!(
        "Overall score {} -> {} ({})",
        report.overall.old,
        report.overall.new,
        report.overall.summarize()
    );

    for section in &report.sections {
        if !section.changed() {
            continue;
        }
        println!();
        println!("{}:", section.title);
        for tally in &section.tallies {
            println!(
                "  {} {} -> {} ({})",
                tally.severity,
                tally.old,
                tally.new,
                tally.summarize()
            );
        }
        for (id, issues) in section.added.iter() {
            for issue in issues {
                println!("  + [{}] {}: {}", issue.severity, id, issue.message);
            }
        }
        for (id, issues) in section.resolved.iter() {
            for issue in issues {
                println!("  - [{}] {}: {}", issue.severity, id, issue.message);
            }
        }
    }

    for error in &report.errors {
        println!("  ! {}", error);
    }
    println!();
}
