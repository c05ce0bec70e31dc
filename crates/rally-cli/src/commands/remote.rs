use clap::Subcommand;
use rally_auth::{CredentialStore, KeyringStore};
use rally_core::config::RallyConfig;
use url::Url;

#[derive(Subcommand)]
pub enum RemoteAction {
    /// Point rally at a remote data API and store its key
    Set {
        /// Project URL, e.g. https://abcd.supabase.co
        url: String,
        /// API key (will prompt if not provided)
        #[arg(long)]
        key: Option<String>,
    },
    /// Check that the configured remote answers
    Verify,
    /// Forget the remote and its key; rally keeps working offline
    Clear,
}

pub async fn run(action: RemoteAction) -> anyhow::Result<()> {
    match action {
        RemoteAction::Set { url, key } => {
            let url = Url::parse(&url).map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", url, e))?;
            let mut config = RallyConfig::load()?;

            let key = match key {
                Some(k) => k,
                None => {
                    eprint!("Enter API key for {url}: ");
                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input)?;
                    input.trim().to_string()
                }
            };
            if key.is_empty() {
                anyhow::bail!("API key cannot be empty");
            }

            KeyringStore::new().store(&config.credential_key, &key)?;
            config.remote_url = Some(url.clone());
            config.save()?;

            println!("Remote set to {url}");
            println!("API key stored in OS keychain as '{}'", config.credential_key);
            Ok(())
        }
        RemoteAction::Verify => {
            let config = RallyConfig::load()?;
            let creds = KeyringStore::new();
            let remote = rally_remote::create_remote(&config, &creds)?
                .ok_or_else(|| anyhow::anyhow!("No remote configured. Use `rally remote set` first."))?;

            let monitor = rally_sync::NetworkMonitor::new(false);
            if monitor.refresh(remote.as_ref(), config.request_timeout()).await {
                println!("Remote is reachable");
            } else {
                println!("Remote is NOT reachable; matches will stay queued");
            }
            Ok(())
        }
        RemoteAction::Clear => {
            let mut config = RallyConfig::load()?;
            let _ = KeyringStore::new().delete(&config.credential_key);
            config.remote_url = None;
            config.save()?;
            println!("Remote cleared; running offline-only");
            Ok(())
        }
    }
}
