use std::{net::SocketAddr, sync::Arc};

use anyhow::{Result, bail};
use clap::Parser;
use svcpanel::{
    cli::{Cli, Commands},
    config::{self, PanelConfig},
    coordinator::CycleOutcome,
    display::PanelSnapshot,
    init_tracing,
    panel::Panel,
    server,
    state::LifecycleAction,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => config::load(config::expand_path(&path.to_string_lossy()))?,
        None => config::load_or_default(config::default_config_path()),
    };

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            let panel = Panel::open(&cfg).await?;
            print_panel(panel.service(), &panel.snapshot());
        }
        Commands::Start => run_action(&cfg, LifecycleAction::Start).await?,
        Commands::Stop => run_action(&cfg, LifecycleAction::Stop).await?,
        Commands::Restart => run_action(&cfg, LifecycleAction::Restart).await?,
        Commands::Watch => watch(&cfg).await?,
        Commands::Serve(opts) => {
            let panel = Arc::new(Panel::open(&cfg).await?);
            server::run(panel, SocketAddr::from((opts.host, opts.port))).await?;
        }
        Commands::WebUi => {
            println!("{}", cfg.web_ui_url()?);
        }
    }

    Ok(())
}

async fn run_action(cfg: &PanelConfig, action: LifecycleAction) -> Result<()> {
    let panel = Panel::open(cfg).await?;
    println!("{} {}...", action.label(), panel.service());

    let outcome = panel.trigger(action).await;
    print_panel(panel.service(), &panel.snapshot());

    let converged = outcome.converged();
    match outcome {
        CycleOutcome::Completed { state, .. } if converged => {
            println!("✓ {} is now {}", panel.service(), state);
            Ok(())
        }
        CycleOutcome::Completed { state, .. } => {
            bail!(
                "{} did not reach {} in time (still {})",
                panel.service(),
                action.expected_state(),
                state
            )
        }
        CycleOutcome::Recovered { error, .. } => bail!("{} failed: {}", action, error),
        CycleOutcome::Rejected { .. } => bail!("another action is already in progress"),
    }
}

async fn watch(cfg: &PanelConfig) -> Result<()> {
    let panel = Panel::open(cfg).await?;
    let mut rx = panel.subscribe();
    print_panel(panel.service(), &rx.borrow_and_update());

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                print_panel(panel.service(), &snapshot);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn print_panel(service: &str, snapshot: &PanelSnapshot) {
    let icon = if snapshot.state.is_running() { "✓" } else { "✗" };
    print!("  {} {}: {}", icon, service, snapshot.state);
    if snapshot.locked {
        print!(" (busy)");
    }
    println!();

    let controls: Vec<String> = LifecycleAction::ALL
        .iter()
        .map(|action| {
            let view = snapshot.controls.get(*action);
            if view.enabled {
                format!("[{}]", view.label)
            } else {
                format!("({})", view.label)
            }
        })
        .collect();
    println!("      {}", controls.join(" "));

    if let Some(err) = &snapshot.last_error {
        println!("      ⚠ last action failed: {}", err);
    }
}
