//! History listing

use bitevibes_core::{HistoryEntry, HistoryRecorder, Result};

use super::HistoryArgs;
use crate::network::NetworkManager;
use crate::state::AppState;

pub async fn run(state: &AppState, network: &NetworkManager, args: HistoryArgs) -> Result<()> {
    let entries = if args.remote {
        network.remote_history(args.limit).await?
    } else {
        HistoryRecorder::new(&state.db).recent(args.limit)?
    };

    if entries.is_empty() {
        println!("No spins yet.");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &HistoryEntry) -> String {
    format!(
        "{}  {:<30} {} [{}]",
        entry.format_timestamp(),
        entry.selected_name,
        entry.source_list_name,
        entry.meal_context
    )
}
