//! Result history recorder
//!
//! Every settled spin becomes a [`HistoryEntry`]. Locally the log keeps the
//! newest [`MAX_LOCAL_HISTORY`] entries; the cloud copy is unbounded and
//! written best-effort.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cloud::CloudStore;
use crate::error::Result;
use crate::invariants::assert_history_invariants;
use crate::models::HistoryEntry;
use crate::storage::HistoryRepository;

/// Local history cap
pub const MAX_LOCAL_HISTORY: usize = 100;

pub struct HistoryRecorder<'a, R: HistoryRepository> {
    repo: &'a R,
}

impl<'a, R: HistoryRepository> HistoryRecorder<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Append locally; a failed write is logged and dropped
    pub fn record(&self, entry: &HistoryEntry) -> bool {
        match self.repo.append_history(entry, MAX_LOCAL_HISTORY) {
            Ok(()) => {
                debug!(name = %entry.selected_name, "History recorded");
                true
            }
            Err(e) => {
                warn!("Failed to record history: {}", e);
                false
            }
        }
    }

    /// Append locally and mirror to the cloud when an identity is known
    pub async fn record_mirrored<C: CloudStore>(
        &self,
        entry: &HistoryEntry,
        cloud: &C,
        user: Option<Uuid>,
    ) -> bool {
        let stored = self.record(entry);
        if let Some(user) = user {
            if let Err(e) = cloud.append_history(user, entry).await {
                warn!(%user, "Failed to mirror history: {}", e);
            }
        }
        stored
    }

    /// Newest entries first, at most `limit`
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let entries = self.repo.recent_history(limit.min(MAX_LOCAL_HISTORY))?;
        assert_history_invariants(&entries, MAX_LOCAL_HISTORY);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::MemoryCloud;
    use crate::models::MealType;
    use crate::storage::Database;

    #[test]
    fn test_never_exceeds_cap() {
        let db = Database::open_in_memory().unwrap();
        let recorder = HistoryRecorder::new(&db);
        for i in 0..(MAX_LOCAL_HISTORY + 25) {
            recorder.record(&HistoryEntry::new(format!("Dish {}", i), "Menu", MealType::All));
        }

        assert_eq!(db.history().count().unwrap(), MAX_LOCAL_HISTORY);
        let newest = recorder.recent(1).unwrap();
        assert_eq!(newest[0].selected_name, format!("Dish {}", MAX_LOCAL_HISTORY + 24));
    }

    #[test]
    fn test_record_prepends_despite_clock_step_back() {
        let db = Database::open_in_memory().unwrap();
        let recorder = HistoryRecorder::new(&db);
        for i in 0..MAX_LOCAL_HISTORY {
            recorder.record(&HistoryEntry::new(format!("Dish {}", i), "Menu", MealType::All));
        }

        let mut late = HistoryEntry::new("Rewound", "Menu", MealType::All);
        late.timestamp -= chrono::Duration::minutes(1);
        assert!(recorder.record(&late));

        let entries = recorder.recent(MAX_LOCAL_HISTORY).unwrap();
        assert_eq!(entries.len(), MAX_LOCAL_HISTORY);
        assert_eq!(entries[0], late);
        assert!(entries.iter().all(|e| e.selected_name != "Dish 0"));
    }

    #[tokio::test]
    async fn test_mirror_failure_is_swallowed() {
        let db = Database::open_in_memory().unwrap();
        let cloud = MemoryCloud::new();
        let user = cloud.sign_in_anonymous().await.unwrap();
        cloud.set_reachable(false);

        let recorder = HistoryRecorder::new(&db);
        let entry = HistoryEntry::new("Sushi", "Menu", MealType::Dinner);
        assert!(recorder.record_mirrored(&entry, &cloud, Some(user)).await);
        assert_eq!(recorder.recent(10).unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_mirror_reaches_cloud() {
        let db = Database::open_in_memory().unwrap();
        let cloud = MemoryCloud::new();
        let user = cloud.sign_in_anonymous().await.unwrap();
        let recorder = HistoryRecorder::new(&db);

        let entry = HistoryEntry::new("Udon", "Menu", MealType::Lunch);
        recorder.record_mirrored(&entry, &cloud, Some(user)).await;
        recorder
            .record_mirrored(&HistoryEntry::new("Soba", "Menu", MealType::Lunch), &cloud, None)
            .await;

        assert_eq!(cloud.recent_history(user, 10).await.unwrap(), vec![entry]);
        assert_eq!(recorder.recent(10).unwrap().len(), 2);
    }
}
