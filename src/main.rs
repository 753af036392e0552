use std::process;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};

use rbrute::brute::Protocol;
use rbrute::cli::Args;
use rbrute::common::{logger, utils};
use rbrute::config::Config;
use rbrute::engine::{CancelFlag, Engine};
use rbrute::output::report;
use rbrute::scanner;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = logger::init(args.verbose, args.silent, args.log_file.as_deref()) {
        eprintln!("logger setup failed: {}", e);
        process::exit(1);
    }

    match run(args).await {
        Ok(false) => {}
        Ok(true) => {
            // Interrupted: partial state was flushed, exit like SIGINT.
            process::exit(130);
        }
        Err(e) => {
            error!("fatal: {:#}", e);
            process::exit(1);
        }
    }
}

/// Returns whether the run was interrupted.
async fn run(args: Args) -> Result<bool> {
    let mut config = Config::default();
    config.state_dir = args.state_dir.clone();

    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    info!("starting brute force against {}", args.host);

    let usernames = resolve_usernames(&args, &config);
    let protocols: Vec<Protocol> = match args.protocol.to_protocol() {
        Some(protocol) => vec![protocol],
        None => {
            info!("probing {} for known services", args.host);
            let detected = scanner::detect_services(&args.host, &config, &cancel).await;
            let names: Vec<&str> = detected.iter().map(|p| p.name()).collect();
            info!("detected services: [{}]", names.join(", "));
            if detected.is_empty() {
                warn!("no services detected on {}, nothing to do", args.host);
                return Ok(cancel.is_cancelled());
            }
            detected
        }
    };

    let engine = Engine::new(&config, cancel.clone());
    let outcome = engine
        .run(&args.host, &usernames, &args.wordlist, &protocols, args.port)
        .await;

    let written = report::save(&args.output, &args.host, &outcome.results, outcome.interrupted)?;

    let cracked = outcome
        .results
        .iter()
        .filter(|r| r.success && !r.skipped)
        .count();
    let skipped = outcome.results.iter().filter(|r| r.skipped).count();
    info!(
        "run {}: {} pair(s), {} cracked, {} already known",
        if outcome.interrupted {
            "interrupted"
        } else {
            "complete"
        },
        outcome.results.len(),
        cracked,
        skipped
    );
    info!("results written to {}", written.display());

    Ok(outcome.interrupted)
}

fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, checkpointing and shutting down");
            cancel.cancel();
        }
    });
}

/// Username precedence: a non-empty --user-file wins, then --user flags,
/// then the built-in defaults.
fn resolve_usernames(args: &Args, config: &Config) -> Vec<String> {
    if let Some(path) = &args.user_file {
        match utils::read_lines_from_file(path) {
            Ok(users) if !users.is_empty() => return users,
            Ok(_) => warn!("user file {} is empty, falling back", path.display()),
            Err(e) => warn!("cannot read user file {}: {}", path.display(), e),
        }
    }
    if !args.users.is_empty() {
        return args.users.clone();
    }
    info!("no usernames supplied, using the built-in list");
    config.default_usernames.clone()
}
