//! Share link export and import

use bitevibes_core::{share, Error, Result};

use super::menu::push;
use super::ShareCommand;
use crate::network::NetworkManager;
use crate::state::{pick_preset, AppState};

pub async fn run(state: &AppState, network: &mut NetworkManager, command: ShareCommand) -> Result<()> {
    match command {
        ShareCommand::Export { preset, base } => {
            let preset = pick_preset(state.menu().data(), preset.as_deref(), state.meal())?;
            println!("{}", share::share_url(&base, &preset)?);
        }
        ShareCommand::Import { link } => {
            let preset = share::import_token(&link)
                .and_then(|token| share::decode(&token))
                .ok_or_else(|| Error::InvalidInput("not a valid share link".into()))?;
            let name = preset.name.clone();
            let count = preset.items.len();

            let mut book = state.menu();
            let id = book.update(|data| Ok(data.import_preset(preset)))?;
            println!("Imported \"{}\" with {} items as {}", name, count, id);
            push(network, book.data().clone()).await;
        }
    }
    Ok(())
}
