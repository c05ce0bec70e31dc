use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum ListsAction {
    /// Show or replace cached opponent names
    Opponents(ListArgs),
    /// Show or replace cached tournament names
    Tournaments(ListArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Replace the cached list (comma-separated)
    #[arg(long, value_delimiter = ',')]
    set: Option<Vec<String>>,
}

pub fn run(action: ListsAction) -> anyhow::Result<()> {
    let store = super::open_store()?;
    let (label, names) = match action {
        ListsAction::Opponents(args) => {
            if let Some(names) = args.set {
                store.cache_opponents(&clean(names));
            }
            ("opponents", store.get_cached_opponents())
        }
        ListsAction::Tournaments(args) => {
            if let Some(names) = args.set {
                store.cache_tournaments(&clean(names));
            }
            ("tournaments", store.get_cached_tournaments())
        }
    };

    if names.is_empty() {
        println!("No cached {label}.");
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn clean(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}
