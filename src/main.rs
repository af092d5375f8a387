//! xprofiles - X profile and tweet collector CLI
//!
//! Main entry point for the xprofiles command-line tool.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};

use xprofiles::cli::{self, Cli, Commands, OutputFormat};
use xprofiles::logging::{OperationGuard, init_cli_logging};
use xprofiles::{
    Config, HttpApiClient, RunReport, ScrapeError, SessionManager, SessionSource, TokioSleeper,
    VALID_CONFIG_KEYS, format_duration, format_error, format_number_usize,
    format_unknown_value_error, output, pipeline,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Credentials are conventionally kept in a .env next to the handle list
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("{} could not read .env: {e}", "warning:".yellow());
        }
    }

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run(args) => cmd_run(&cli, args).await,
        Commands::Login(args) => cmd_login(&cli, args).await,
        Commands::Convert(args) => cmd_convert(&cli, args),
        Commands::Config(args) => cmd_config(&cli, args),
        Commands::Completions(args) => cmd_completions(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Marks an error whose message was already printed in full.
#[derive(Debug)]
struct AlreadyReported;

impl std::fmt::Display for AlreadyReported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("error already reported")
    }
}

impl std::error::Error for AlreadyReported {}

fn report_error(error: &anyhow::Error) {
    if error.downcast_ref::<AlreadyReported>().is_some() {
        return;
    }

    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    let suggestion = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ScrapeError>())
        .and_then(ScrapeError::suggestion);

    let suggestions: Vec<&str> = suggestion.into_iter().collect();
    eprintln!(
        "{}",
        format_error(&error.to_string(), &chain.join("\n   "), &suggestions)
    );
}

fn load_config(cli: &Cli) -> Result<Config> {
    Config::load(cli.config.as_deref()).context("Failed to load configuration")
}

fn init_logging(cli: &Cli, file: Option<std::path::PathBuf>) -> Result<()> {
    init_cli_logging(cli.quiet, cli.verbose, file).context("Failed to initialize logging")
}

/// Resolves on the first Ctrl-C. Stays pending if the handler can't be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn cmd_run(cli: &Cli, args: &cli::RunArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    args.apply(&mut config);
    config.validate()?;

    let log_file = (!args.no_log_file).then(|| config.log_path());
    init_logging(cli, log_file)?;
    debug!(config = ?config.redacted(), "Effective configuration");

    let api = Arc::new(HttpApiClient::new(&config.api)?);
    let progress = (!cli.quiet && cli.format == OutputFormat::Text).then(progress_bar);

    let guard = OperationGuard::new("run");
    let report = match pipeline::execute(
        config,
        api,
        Arc::new(TokioSleeper),
        progress,
        shutdown_signal(),
    )
    .await
    {
        Ok(report) => {
            guard.complete();
            report
        }
        Err(e) => {
            guard.fail(&e);
            return Err(e.into());
        }
    };

    print_run_summary(cli, &report)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

fn print_run_summary(cli: &Cli, report: &RunReport) -> Result<()> {
    let results = &report.results;

    if cli.format == OutputFormat::Json {
        let summary = serde_json::json!({
            "processed": results.processed,
            "users": results.users.len(),
            "tweets": results.tweets.len(),
            "highlight_tweets": results.highlight_tweets.len(),
            "skipped": results.skipped.iter().map(|s| serde_json::json!({
                "handle": s.handle,
                "reason": s.reason,
            })).collect::<Vec<_>>(),
            "interrupted": results.interrupted,
            "elapsed_secs": report.elapsed.as_secs_f64(),
            "json": report.outputs.json,
            "users_csv": report.outputs.users_csv,
            "tweets_csv": report.outputs.tweets_csv,
            "highlight_tweets_csv": report.outputs.highlight_tweets_csv,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if cli.quiet {
        return Ok(());
    }

    let title = if results.interrupted {
        "Run interrupted, partial results saved".bold().yellow()
    } else {
        "Data collection complete".bold().green()
    };
    println!("{title}");

    let session = match report.session_source {
        SessionSource::Stored => "stored cookies",
        SessionSource::FreshLogin => "fresh login",
    };
    println!("  Session:          {session}");
    println!(
        "  Profiles:         {}",
        format_number_usize(results.users.len())
    );
    println!(
        "  Tweets:           {}",
        format_number_usize(results.tweets.len())
    );
    println!(
        "  Highlight tweets: {}",
        format_number_usize(results.highlight_tweets.len())
    );
    println!("  Elapsed:          {}", format_duration(report.elapsed));

    if !results.skipped.is_empty() {
        println!();
        println!("{}", format!("Skipped {} handle(s):", results.skipped.len()).yellow());
        for skipped in &results.skipped {
            println!("  @{}: {}", skipped.handle, skipped.reason.dimmed());
        }
    }

    println!();
    println!("  {} {}", "✓".green(), report.outputs.json.display());
    println!("  {} {}", "✓".green(), report.outputs.users_csv.display());
    println!("  {} {}", "✓".green(), report.outputs.tweets_csv.display());
    println!(
        "  {} {}",
        "✓".green(),
        report.outputs.highlight_tweets_csv.display()
    );
    Ok(())
}

async fn cmd_login(cli: &Cli, args: &cli::LoginArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(p) = &args.cookies {
        config.paths.cookies.clone_from(p);
    }
    init_logging(cli, None)?;

    let api = Arc::new(HttpApiClient::new(&config.api)?);
    let fetch = pipeline::fetch_controller(&config, Arc::new(TokioSleeper));
    let manager = SessionManager::new(
        api,
        fetch,
        config.paths.cookies.clone(),
        config.credentials.clone(),
    );
    let session = manager.acquire_with(args.force).await?;

    if !cli.quiet {
        let how = match session.source() {
            SessionSource::Stored => "Stored cookies are valid",
            SessionSource::FreshLogin => "Logged in and saved cookies",
        };
        println!(
            "{} {} ({})",
            "✓".green(),
            how,
            config.paths.cookies.display()
        );
    }
    Ok(())
}

fn cmd_convert(cli: &Cli, args: &cli::ConvertArgs) -> Result<()> {
    init_logging(cli, None)?;

    let dir = args.output_dir.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| std::path::PathBuf::from("."), std::path::Path::to_path_buf)
    });
    let paths = output::convert_json_to_csv(&args.input, &dir)
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    if !cli.quiet {
        println!("{}", "CSV files written".bold().green());
        for path in [&paths.users_csv, &paths.tweets_csv, &paths.highlight_tweets_csv] {
            println!("  {} {}", "✓".green(), path.display());
        }
    }
    Ok(())
}

fn cmd_config(cli: &Cli, args: &cli::ConfigArgs) -> Result<()> {
    if args.default {
        print!("{}", Config::default_config_content());
        return Ok(());
    }

    let config = load_config(cli)?;

    if let Some(key) = &args.get {
        if !VALID_CONFIG_KEYS.contains(&key.as_str()) {
            eprintln!(
                "{}",
                format_unknown_value_error("config key", key, VALID_CONFIG_KEYS)
            );
            return Err(AlreadyReported.into());
        }
        let value = config
            .get(key)
            .with_context(|| format!("No value for config key '{key}'"))?;
        println!("{value}");
        return Ok(());
    }

    let source = cli.config.clone().or_else(Config::user_config_path);

    if !args.show {
        match &source {
            Some(path) if path.exists() => println!("Config file: {}", path.display()),
            Some(path) => println!("Config file: {} (not found, using defaults)", path.display()),
            None => println!("Config file: none (using defaults)"),
        }
        println!(
            "{}",
            "Run 'xprofiles config --show' for the effective settings.".dimmed()
        );
        return Ok(());
    }

    if cli.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    println!("{}", "Current Configuration".bold().cyan());
    if let Some(path) = &source {
        println!("  Source: {}", path.display().to_string().dimmed());
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_completions(args: &cli::CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "xprofiles", &mut io::stdout());
    Ok(())
}
