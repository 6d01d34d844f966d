//! Hub connection and cloud sync for the CLI
//!
//! Everything here except [`NetworkManager::connect`] is best-effort: the
//! app keeps working offline and only logs what it could not sync.

use bitevibes_core::cloud::{self, DebouncedSave};
use bitevibes_core::menu::MenuData;
use bitevibes_core::{Error, HistoryEntry, HistoryRecorder, Result};
use bitevibes_net::HubClient;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Lazily connected hub client plus the anonymous identity
pub struct NetworkManager {
    client: Option<HubClient>,
    user: Option<Uuid>,
    /// Room id for this run when there is no signed-in identity
    guest_id: Uuid,
    pending_save: DebouncedSave,
}

impl NetworkManager {
    pub fn new() -> Self {
        Self {
            client: None,
            user: None,
            guest_id: Uuid::new_v4(),
            pending_save: DebouncedSave::default(),
        }
    }

    pub fn client(&self) -> Option<&HubClient> {
        self.client.as_ref()
    }

    /// Id used inside rooms: the cloud identity, or one fixed for this run
    pub fn participant(&self) -> Uuid {
        self.user.unwrap_or(self.guest_id)
    }

    /// Connect to the hub and resolve the anonymous identity
    pub async fn connect(&mut self, state: &AppState) -> Result<&HubClient> {
        if self.client.is_none() {
            let addr = state.config.hub.socket_addr()?;
            let timeout = state.config.hub.request_timeout();
            let client = match tokio::time::timeout(timeout, HubClient::connect(addr)).await {
                Ok(connected) => connected?.with_timeout(timeout),
                Err(_) => return Err(Error::Transport(format!("hub {} did not answer", addr))),
            };
            info!(%addr, "Connected to hub");

            self.pending_save = DebouncedSave::new(state.config.sync.debounce());
            match cloud::resolve_identity(&client, &state.db.settings()).await {
                Ok(user) => self.user = Some(user),
                Err(e) => warn!("Anonymous sign-in failed: {}", e),
            }
            self.client = Some(client);
        }
        self.client
            .as_ref()
            .ok_or_else(|| Error::Transport("not connected".into()))
    }

    /// Connect and pull the cloud menu over the local one, when sync is on
    pub async fn sync_on_start(&mut self, state: &AppState) {
        if !state.config.sync.enabled {
            debug!("Cloud sync disabled");
            return;
        }
        if let Err(e) = self.connect(state).await {
            warn!("Working offline: {}", e);
            return;
        }
        let (Some(client), Some(user)) = (self.client.as_ref(), self.user) else {
            return;
        };
        let mut book = state.menu();
        if let Err(e) = cloud::pull_menu(client, user, &mut book).await {
            warn!("Failed to load cloud menu: {}", e);
        }
    }

    /// Queue the latest menu for upload
    pub fn schedule_save(&mut self, data: MenuData) {
        if self.client.is_some() && self.user.is_some() {
            self.pending_save.schedule(data);
        }
    }

    /// Upload the queued menu now; the CLI exits right after an edit
    pub async fn flush_saves(&mut self) {
        let (Some(client), Some(user)) = (self.client.as_ref(), self.user) else {
            return;
        };
        self.pending_save.flush(client, user).await;
    }

    /// Record a result locally and mirror it to the cloud when signed in
    pub async fn record_history(&self, state: &AppState, entry: &HistoryEntry) -> bool {
        let recorder = HistoryRecorder::new(&state.db);
        match &self.client {
            Some(client) => recorder.record_mirrored(entry, client, self.user).await,
            None => recorder.record(entry),
        }
    }

    /// Newest cloud history entries
    pub async fn remote_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        use bitevibes_core::CloudStore;

        let (Some(client), Some(user)) = (self.client.as_ref(), self.user) else {
            return Err(Error::Transport("not signed in to the hub".into()));
        };
        client.recent_history(user, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_is_stable_without_sign_in() {
        let network = NetworkManager::new();
        assert_eq!(network.participant(), network.participant());
        assert_ne!(network.participant(), NetworkManager::new().participant());
    }
}
