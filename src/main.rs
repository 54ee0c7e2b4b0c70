use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use lookout::alert::{AlertDispatcher, DiscordWebhook, SlackWebhook};
use lookout::config::{AlertConfig, Config};
use lookout::fixtures::MongoFixtureStore;
use lookout::orchestrator::{Orchestrator, RunState};
use lookout::probes::{ProbeContext, default_sequence};
use lookout::search::HttpSearchClient;

#[derive(Parser, Debug)]
#[command(name = "lookout", version, about = "Scheduled health checks for the search API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Override SEARCH_API_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Run probes but never send alerts
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print the run outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level, including every search request
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full probe sequence once (default)
    Run,
    /// Print the probe sequence without running it
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(true)
        .init();

    let outcome = match cli.command {
        Some(Command::List) => {
            for probe in default_sequence() {
                println!("{}", probe.name());
            }
            Ok(0)
        }
        Some(Command::Run) | None => run(&cli).await,
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "health check harness failed");
            ExitCode::FAILURE
        }
    }
}

fn build_dispatcher(
    client: &reqwest::Client,
    alerts: &AlertConfig,
    dry_run: bool,
) -> AlertDispatcher {
    let mut dispatcher = AlertDispatcher::new();
    if dry_run {
        return dispatcher;
    }
    if let Some(url) = &alerts.slack_webhook_url {
        dispatcher = dispatcher.with_sink(
            Box::new(SlackWebhook::new(client.clone(), url.clone())),
            alerts.slack_enabled,
        );
    }
    if let Some(url) = &alerts.discord_webhook_url {
        dispatcher = dispatcher.with_sink(
            Box::new(DiscordWebhook::new(client.clone(), url.clone())),
            alerts.discord_enabled,
        );
    }
    dispatcher
}

async fn run(cli: &Cli) -> Result<u8> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("lookout/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let config = match Config::from_env(cli.base_url.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let dispatcher = build_dispatcher(&http, &Config::alerts_from_env(), cli.dry_run);
            dispatcher
                .notify_critical(
                    &nanoid::nanoid!(10),
                    "health check configuration invalid",
                    &e.to_string(),
                )
                .await;
            return Ok(1);
        }
    };

    let dispatcher = build_dispatcher(&http, &config.alerts, cli.dry_run);

    let fixtures = match MongoFixtureStore::new(
        &config.mongo_uri,
        &config.mongo_db_name,
        &config.fixture_collection,
    )
    .await
    {
        Ok(store) => store,
        Err(e) => {
            dispatcher
                .notify_critical(
                    &nanoid::nanoid!(10),
                    "fixture store could not be initialised",
                    &format!("{e:#}"),
                )
                .await;
            return Ok(1);
        }
    };

    let api = HttpSearchClient::with_client(http.clone(), &config.api_base_url);
    let ctx = ProbeContext::new(Arc::new(api), Arc::new(fixtures), config.probes.clone());
    let orchestrator = Orchestrator::with_default_sequence(ctx);

    let outcome = orchestrator.run_and_notify(&dispatcher).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialize run outcome")?
        );
    } else {
        println!(
            "run {} {:?} ({})",
            outcome.run_id,
            outcome.state,
            outcome.started_at.to_rfc3339()
        );
        if let Some(fatal) = &outcome.fatal_error {
            println!("aborted: {fatal}");
        }
        print!("{}", outcome.report);
    }

    if outcome.state == RunState::Aborted {
        error!(run_id = %outcome.run_id, "health check run aborted");
    }
    Ok(outcome.exit_code())
}
