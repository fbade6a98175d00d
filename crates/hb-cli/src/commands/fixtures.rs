//! Shared fixtures for command tests.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use hb_core::{Heartbeat, HeartbeatStore, RawHeartbeat, User, UserId};
use hb_db::Database;

pub fn user() -> User {
    User::new(UserId::new("alice").unwrap())
}

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
}

#[expect(clippy::cast_precision_loss, reason = "test timestamps fit in f64")]
pub fn heartbeat(project: &str, entity: &str, time: DateTime<Utc>) -> Heartbeat {
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
        time: time.timestamp_millis() as f64 / 1000.0,
        ..RawHeartbeat::default()
    }
    .into_heartbeat(&user().id)
    .unwrap()
    .hashed()
}

/// Stores three heartbeats 30s apart on `project`, starting at `start`.
pub fn seed_minute(db: &Database, project: &str, start: DateTime<Utc>) {
    let heartbeats: Vec<Heartbeat> = (0..3)
        .map(|i| heartbeat(project, "main.go", start + TimeDelta::seconds(30 * i)))
        .collect();
    db.insert_batch(&heartbeats).unwrap();
}
