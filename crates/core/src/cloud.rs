//! Per-user cloud documents
//!
//! The remote side keeps one menu document and an unbounded history log per
//! anonymous user. Everything here is optional: the app works offline and
//! cloud failures never reach the local state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::menu::{MenuBook, MenuData};
use crate::models::HistoryEntry;
use crate::storage::{MenuRepository, SettingsStore};

/// Quiet period before a menu edit is pushed to the cloud
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Remote per-user storage
#[allow(async_fn_in_trait)]
pub trait CloudStore {
    /// Issue a fresh anonymous identity
    async fn sign_in_anonymous(&self) -> Result<Uuid>;

    async fn load_menu(&self, user: Uuid) -> Result<Option<MenuData>>;

    async fn save_menu(&self, user: Uuid, data: &MenuData) -> Result<()>;

    async fn append_history(&self, user: Uuid, entry: &HistoryEntry) -> Result<()>;

    /// Newest first
    async fn recent_history(&self, user: Uuid, limit: usize) -> Result<Vec<HistoryEntry>>;
}

/// Reuse the stored anonymous identity or sign in for a new one
pub async fn resolve_identity<C: CloudStore>(cloud: &C, settings: &SettingsStore<'_>) -> Result<Uuid> {
    if let Some(user) = settings.user_id()? {
        return Ok(user);
    }
    let user = cloud.sign_in_anonymous().await?;
    settings.set_user_id(user)?;
    info!(%user, "Signed in anonymously");
    Ok(user)
}

/// First load after sign-in: a remote menu replaces the local one
///
/// Returns true if local data was replaced.
pub async fn pull_menu<C: CloudStore, R: MenuRepository>(
    cloud: &C,
    user: Uuid,
    book: &mut MenuBook<'_, R>,
) -> Result<bool> {
    match cloud.load_menu(user).await? {
        Some(remote) if !remote.presets.is_empty() => {
            info!(presets = remote.presets.len(), "Loaded menu from cloud");
            book.replace(remote);
            Ok(true)
        }
        _ => {
            debug!("No cloud menu yet, keeping local data");
            Ok(false)
        }
    }
}

/// Cancellable delayed cloud save
///
/// Each [`schedule`](Self::schedule) supersedes the pending save and restarts
/// the quiet period; only the latest document is ever written.
#[derive(Debug)]
pub struct DebouncedSave {
    delay: Duration,
    pending: Option<(Instant, MenuData)>,
}

impl DebouncedSave {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, data: MenuData) {
        if self.pending.is_some() {
            debug!("Superseding pending cloud save");
        }
        self.pending = Some((Instant::now() + self.delay, data));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending document without waiting
    pub fn take(&mut self) -> Option<MenuData> {
        self.pending.take().map(|(_, data)| data)
    }

    /// Wait out the quiet period and take the document
    ///
    /// Never completes while nothing is scheduled, so it can sit in a
    /// `select!` next to other work.
    pub async fn ready(&mut self) -> MenuData {
        loop {
            let due = self.pending.as_ref().map(|(due, _)| *due);
            match due {
                Some(due) => {
                    sleep_until(due).await;
                    if let Some(data) = self.take() {
                        return data;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Write the pending document now, if any; failures are logged
    pub async fn flush<C: CloudStore>(&mut self, cloud: &C, user: Uuid) -> bool {
        match self.take() {
            Some(data) => save_best_effort(cloud, user, &data).await,
            None => false,
        }
    }
}

impl Default for DebouncedSave {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

/// Save a menu document, logging instead of failing
pub async fn save_best_effort<C: CloudStore>(cloud: &C, user: Uuid, data: &MenuData) -> bool {
    match cloud.save_menu(user, data).await {
        Ok(()) => {
            debug!(%user, "Menu saved to cloud");
            true
        }
        Err(e) => {
            warn!(%user, "Cloud save failed: {}", e);
            false
        }
    }
}

#[derive(Default)]
struct CloudDocument {
    menu: Option<MenuData>,
    history: Vec<HistoryEntry>,
}

struct MemoryCloudState {
    users: HashMap<Uuid, CloudDocument>,
    reachable: bool,
    menu_writes: u64,
}

/// In-process cloud used by tests and offline runs
#[derive(Clone)]
pub struct MemoryCloud {
    inner: Arc<Mutex<MemoryCloudState>>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryCloudState {
                users: HashMap::new(),
                reachable: true,
                menu_writes: 0,
            })),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    pub fn menu_writes(&self) -> u64 {
        self.lock().menu_writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCloudState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reachable(&self) -> Result<MutexGuard<'_, MemoryCloudState>> {
        let guard = self.lock();
        if !guard.reachable {
            return Err(Error::Transport("cloud unreachable".into()));
        }
        Ok(guard)
    }
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudStore for MemoryCloud {
    async fn sign_in_anonymous(&self) -> Result<Uuid> {
        let mut state = self.reachable()?;
        let user = Uuid::new_v4();
        state.users.insert(user, CloudDocument::default());
        Ok(user)
    }

    async fn load_menu(&self, user: Uuid) -> Result<Option<MenuData>> {
        let state = self.reachable()?;
        Ok(state.users.get(&user).and_then(|doc| doc.menu.clone()))
    }

    async fn save_menu(&self, user: Uuid, data: &MenuData) -> Result<()> {
        let mut state = self.reachable()?;
        state.menu_writes += 1;
        state.users.entry(user).or_default().menu = Some(data.clone());
        Ok(())
    }

    async fn append_history(&self, user: Uuid, entry: &HistoryEntry) -> Result<()> {
        let mut state = self.reachable()?;
        state.users.entry(user).or_default().history.push(entry.clone());
        Ok(())
    }

    async fn recent_history(&self, user: Uuid, limit: usize) -> Result<Vec<HistoryEntry>> {
        let state = self.reachable()?;
        let mut entries = state
            .users
            .get(&user)
            .map(|doc| doc.history.clone())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealType;
    use crate::storage::Database;

    #[tokio::test(start_paused = true)]
    async fn test_debounce_writes_latest_once() {
        let cloud = MemoryCloud::new();
        let user = cloud.sign_in_anonymous().await.unwrap();
        let mut saver = DebouncedSave::default();

        let mut data = MenuData::default();
        saver.schedule(data.clone());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        data.add_preset("Later", MealType::Dinner).unwrap();
        saver.schedule(data.clone());

        let started = Instant::now();
        let ready = saver.ready().await;
        assert!(started.elapsed() >= DEFAULT_DEBOUNCE);
        assert!(started.elapsed() < DEFAULT_DEBOUNCE + Duration::from_millis(10));
        assert!(save_best_effort(&cloud, user, &ready).await);

        assert_eq!(cloud.menu_writes(), 1);
        assert_eq!(cloud.load_menu(user).await.unwrap(), Some(data));
        assert!(!saver.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_save_never_fires() {
        let mut saver = DebouncedSave::default();
        saver.schedule(MenuData::default());
        saver.cancel();

        let waited = tokio::time::timeout(Duration::from_secs(10), saver.ready()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_flush_swallows_failures() {
        let cloud = MemoryCloud::new();
        let user = cloud.sign_in_anonymous().await.unwrap();
        cloud.set_reachable(false);

        let mut saver = DebouncedSave::default();
        saver.schedule(MenuData::default());
        assert!(!saver.flush(&cloud, user).await);
        assert!(!saver.is_pending());
    }

    #[tokio::test]
    async fn test_identity_is_reused() {
        let db = Database::open_in_memory().unwrap();
        let cloud = MemoryCloud::new();

        let first = resolve_identity(&cloud, &db.settings()).await.unwrap();
        let second = resolve_identity(&cloud, &db.settings()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_pull_menu_replaces_local() {
        let db = Database::open_in_memory().unwrap();
        let cloud = MemoryCloud::new();
        let user = cloud.sign_in_anonymous().await.unwrap();
        let mut book = MenuBook::load(&db);

        assert!(!pull_menu(&cloud, user, &mut book).await.unwrap());

        let mut remote = MenuData::default();
        remote.add_preset("From phone", MealType::Lunch).unwrap();
        cloud.save_menu(user, &remote).await.unwrap();

        assert!(pull_menu(&cloud, user, &mut book).await.unwrap());
        assert_eq!(book.data(), &remote);
        assert_eq!(db.load_menu().unwrap(), Some(remote));
    }
}
