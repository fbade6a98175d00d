//! In-memory store doubles and fixtures for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::alias::{Alias, ProjectLabel};
use crate::filters::Filters;
use crate::heartbeat::{Heartbeat, RawHeartbeat};
use crate::store::{AliasStore, HeartbeatStore, LabelStore, SummaryStore};
use crate::summary::Summary;
use crate::summary_kind::SummaryKind;
use crate::types::UserId;
use crate::user::User;
use crate::{Error, Result};

pub fn user() -> User {
    User::new(UserId::new("alice").unwrap())
}

#[expect(clippy::cast_precision_loss, reason = "test timestamps fit in f64")]
pub fn heartbeat(project: &str, entity: &str, at: DateTime<Utc>) -> Heartbeat {
    RawHeartbeat {
        entity: Some(entity.to_string()),
        kind: Some("file".to_string()),
        category: Some("coding".to_string()),
        project: Some(project.to_string()),
        branch: Some("main".to_string()),
        language: Some("Go".to_string()),
        editor: Some("Goland".to_string()),
        operating_system: Some("Linux".to_string()),
        machine: Some("desktop".to_string()),
        time: at.timestamp_millis() as f64 / 1000.0,
        ..RawHeartbeat::default()
    }
    .into_heartbeat(&user().id)
    .unwrap()
    .hashed()
}

#[derive(Debug, thiserror::Error)]
#[error("store unavailable")]
struct Unavailable;

/// Implements every store trait over plain vectors.
#[derive(Default)]
pub struct MemoryStore {
    heartbeats: Mutex<Vec<Heartbeat>>,
    summaries: Mutex<Vec<Summary>>,
    aliases: Mutex<Vec<Alias>>,
    labels: Mutex<Vec<ProjectLabel>>,
    initialized: Mutex<Vec<UserId>>,
    fail_heartbeats: AtomicBool,
    fail_heartbeats_from: Mutex<Option<DateTime<Utc>>>,
    fail_summaries: AtomicBool,
}

impl MemoryStore {
    pub fn add_heartbeats(&self, heartbeats: Vec<Heartbeat>) {
        let mut stored = self.heartbeats.lock().unwrap();
        stored.extend(heartbeats);
        stored.sort_by_key(|h| h.time);
    }

    pub fn add_summary(&self, summary: Summary) {
        self.summaries.lock().unwrap().push(summary);
    }

    pub fn add_alias(&self, kind: SummaryKind, key: &str, value: &str) {
        self.aliases.lock().unwrap().push(Alias {
            user_id: user().id,
            kind,
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    pub fn add_label(&self, project: &str, label: &str) {
        self.labels.lock().unwrap().push(ProjectLabel {
            user_id: user().id,
            project_key: project.to_string(),
            label: label.to_string(),
        });
    }

    pub fn fail_heartbeats(&self) {
        self.fail_heartbeats.store(true, Ordering::SeqCst);
    }

    /// Fails heartbeat queries whose range starts at or after `from`.
    pub fn fail_heartbeats_from(&self, from: DateTime<Utc>) {
        *self.fail_heartbeats_from.lock().unwrap() = Some(from);
    }

    pub fn fail_summaries(&self) {
        self.fail_summaries.store(true, Ordering::SeqCst);
    }

    pub fn initialized(&self) -> Vec<UserId> {
        self.initialized.lock().unwrap().clone()
    }
}

impl HeartbeatStore for MemoryStore {
    fn get_all_within(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &UserId,
    ) -> Result<Vec<Heartbeat>> {
        let failing_from = *self.fail_heartbeats_from.lock().unwrap();
        if self.fail_heartbeats.load(Ordering::SeqCst) || failing_from.is_some_and(|f| from >= f) {
            return Err(Error::upstream(Unavailable));
        }
        Ok(self
            .heartbeats
            .lock()
            .unwrap()
            .iter()
            .filter(|h| &h.user_id == user && h.time >= from && h.time < to)
            .cloned()
            .collect())
    }

    fn get_all_within_by_filters(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &UserId,
        filters: &Filters,
    ) -> Result<Vec<Heartbeat>> {
        let all = self.get_all_within(from, to, user)?;
        Ok(all
            .into_iter()
            .filter(|h| filters.matches(&crate::duration::Duration::from_heartbeat(h)))
            .collect())
    }

    fn insert_batch(&self, heartbeats: &[Heartbeat]) -> Result<usize> {
        let mut stored = self.heartbeats.lock().unwrap();
        let before = stored.len();
        for hb in heartbeats {
            if !stored.iter().any(|h| h.user_id == hb.user_id && h.hash == hb.hash) {
                stored.push(hb.clone());
            }
        }
        stored.sort_by_key(|h| h.time);
        Ok(stored.len() - before)
    }

    fn get_first_by_user(&self, user: &UserId) -> Result<Option<Heartbeat>> {
        Ok(self
            .heartbeats
            .lock()
            .unwrap()
            .iter()
            .find(|h| &h.user_id == user)
            .cloned())
    }

    fn get_last_by_user(&self, user: &UserId) -> Result<Option<Heartbeat>> {
        Ok(self
            .heartbeats
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|h| &h.user_id == user)
            .cloned())
    }
}

impl SummaryStore for MemoryStore {
    fn get_by_user_within(
        &self,
        user: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Summary>> {
        if self.fail_summaries.load(Ordering::SeqCst) {
            return Err(Error::upstream(Unavailable));
        }
        Ok(self
            .summaries
            .lock()
            .unwrap()
            .iter()
            .filter(|s| &s.user_id == user && s.from >= from && s.to <= to)
            .cloned()
            .collect())
    }

    fn insert(&self, summary: &Summary) -> Result<i64> {
        let mut stored = self.summaries.lock().unwrap();
        let id = i64::try_from(stored.len()).unwrap() + 1;
        let mut summary = summary.clone();
        summary.id = Some(id);
        stored.push(summary);
        Ok(id)
    }
}

impl AliasStore for MemoryStore {
    fn initialize_user(&self, user: &UserId) -> Result<()> {
        self.initialized.lock().unwrap().push(user.clone());
        Ok(())
    }

    fn get_alias_or_default(&self, user: &UserId, kind: SummaryKind, key: &str) -> Result<String> {
        Ok(self
            .aliases
            .lock()
            .unwrap()
            .iter()
            .find(|a| &a.user_id == user && a.kind == kind && a.value == key)
            .map_or_else(|| key.to_string(), |a| a.key.clone()))
    }

    fn get_by_key(&self, user: &UserId, kind: SummaryKind, key: &str) -> Result<Vec<Alias>> {
        Ok(self
            .aliases
            .lock()
            .unwrap()
            .iter()
            .filter(|a| &a.user_id == user && a.kind == kind && a.key == key)
            .cloned()
            .collect())
    }
}

impl LabelStore for MemoryStore {
    fn get_by_user(&self, user: &UserId) -> Result<Vec<ProjectLabel>> {
        Ok(self
            .labels
            .lock()
            .unwrap()
            .iter()
            .filter(|l| &l.user_id == user)
            .cloned()
            .collect())
    }
}
