//! lxb entry point.
//!
//! Reads an lxfile, builds it on the local LXD daemon and prints the new
//! image's fingerprint on stdout. Logs go to stderr, build command output to
//! stdout.

mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Cli;
use lxb_core::{Build, BuildSpec, BuilderConfig};
use lxb_lxd::LxdClient;
use std::io::Read;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_TARGETS: &[&str] = &["lxb", "lxb_core", "lxb_lxd"];

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}={level}").parse()?);
    }
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn load_spec(cli: &Cli) -> anyhow::Result<BuildSpec> {
    if cli.reads_stdin() {
        tracing::info!("Reading lxfile from standard input");
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading lxfile from stdin")?;
        return Ok(BuildSpec::from_yaml(&text)?);
    }
    BuildSpec::load(&cli.lxfile).with_context(|| format!("loading {}", cli.lxfile.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let spec = load_spec(&cli)?;

    if !cli.context.is_dir() {
        bail!("context {} is not a directory", cli.context.display());
    }
    std::env::set_current_dir(&cli.context)
        .with_context(|| format!("entering context {}", cli.context.display()))?;

    let mut config = BuilderConfig::from_env();
    if let Some(remote) = &cli.remote {
        config.remote = remote.clone();
    }
    tracing::debug!(?config, "Configuration loaded");

    let socket = config
        .socket_path
        .clone()
        .unwrap_or_else(LxdClient::default_socket_path);
    let client = LxdClient::connect(&socket)
        .await
        .with_context(|| format!("connecting to LXD at {}", socket.display()))?;
    if !client.is_trusted() {
        bail!("LXD does not trust this client; is the user in the lxd group?");
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current step");
            on_signal.cancel();
        }
    });

    let mut build = Build::new(&spec, &client, config).with_cancellation(cancel);
    if let Some(suffix) = &cli.suffix {
        build = build.with_suffix(suffix);
    }

    match build.execute(cli.keep).await {
        Ok(outcome) => {
            tracing::info!(instance = %outcome.instance, image = %outcome.image, "Image built");
            println!("{}", outcome.image);
            Ok(())
        }
        Err(e) => {
            if let Some(instance) = e.surviving_instance() {
                tracing::error!(instance = %instance, "Build failed, container left in place");
            }
            Err(e.into())
        }
    }
}
