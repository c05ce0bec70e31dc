use clap::Args;
use console::style;
use rally_auth::KeyringStore;
use rally_core::config::RallyConfig;
use rally_sync::{Connectivity, NetworkMonitor, SyncEngine};

#[derive(Args)]
pub struct SyncArgs {
    /// Skip the reachability check and try every pending match
    #[arg(long)]
    force: bool,
    /// No progress spinner
    #[arg(long, short)]
    quiet: bool,
}

pub async fn run(args: SyncArgs) -> anyhow::Result<()> {
    let config = RallyConfig::load()?;
    let store = super::open_store()?;
    let pending = store.get_pending_matches().len();

    if config.app_mode.is_demo() {
        println!("Demo mode: sync is disabled; {pending} match(es) stay on this device.");
        return Ok(());
    }

    let creds = KeyringStore::new();
    let Some(remote) = rally_remote::create_remote(&config, &creds)? else {
        println!(
            "No remote configured; {pending} match(es) waiting. Use `rally remote set` to enable sync."
        );
        return Ok(());
    };

    if pending == 0 {
        println!("Nothing to sync.");
        return Ok(());
    }

    if !args.force {
        let monitor = NetworkMonitor::default();
        monitor.refresh(remote.as_ref(), config.request_timeout()).await;
        if !monitor.is_online() {
            println!(
                "{} remote unreachable; {pending} match(es) stay queued",
                style("offline:").yellow().bold()
            );
            return Ok(());
        }
    }

    let engine = SyncEngine::from_config(store.clone(), &config).with_progress(!args.quiet);
    let summary = engine.sync_all_pending(Some(remote.as_ref())).await;

    let failed = if summary.failed > 0 {
        style(format!("{} failed", summary.failed)).red().bold()
    } else {
        style(format!("{} failed", summary.failed)).dim()
    };
    println!(
        "Sync complete: {} | {}",
        style(format!("{} synced", summary.synced)).green().bold(),
        failed
    );
    if summary.failed > 0 {
        println!("Failed matches stay queued; run `rally sync` again when the connection improves.");
    }
    Ok(())
}
