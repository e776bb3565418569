// ABOUTME: CLI entrypoint for instafeed command
// ABOUTME: Wires config, API client, cache and feed; maps errors to exit codes

use clap::Parser;
use instafeed::{
    api::{ApiClient, ClientOptions},
    auth::{resolve_credentials, AuthInputs, TokenSource},
    cli::Cli,
    feed::AtomFeed,
    github,
    retry::RetryPolicy,
    storage::FileStore,
    sync,
    util::env_var_or,
    Result,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting...");
    if let Err(e) = run() {
        error!("[E{}] {}", e.exit_code(), e);
        std::process::exit(e.exit_code());
    }
    info!("Done.");
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let resolved = resolve_credentials(AuthInputs {
        username: cli.username.clone(),
        password: cli.password.clone(),
        ..Default::default()
    })?;

    let options = ClientOptions::default()
        .with_base_endpoint(cli.api_base.clone())
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_retry(RetryPolicy::default().with_max_retries(cli.max_retries));
    let mut client = ApiClient::new(resolved.credentials, options)?;

    if let TokenSource::Login { username, password } = resolved.token_source {
        let (token, secret) = client
            .acquire_token(&username, &password)
            .map_err(|e| e.context("getting token"))?;

        info!("Save the following environment variables:");
        info!("INSTAPAPER_TOKEN={}", token);
        info!("INSTAPAPER_TOKEN_SECRET={}", secret);

        client.set_token(token, secret);
    }

    let storage_path = cli
        .storage_path
        .unwrap_or_else(|| PathBuf::from(env_var_or("STORAGE_PATH", "instapaper.json")));
    let feed_path = cli
        .feed_path
        .unwrap_or_else(|| PathBuf::from(env_var_or("FEED_PATH", "feed.xml")));

    let mut store = FileStore::new(storage_path);
    let renderer = AtomFeed::default().with_title(cli.feed_title);

    let new_count = sync::run(&client, &mut store, &renderer, &feed_path, cli.progress)?;
    info!(new_count, "sync finished");

    if github::running_in_actions() {
        github::write_output("new_bookmarks_count", &new_count.to_string())?;
    }

    Ok(())
}
