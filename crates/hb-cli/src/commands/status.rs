//! Status command for showing what is stored for a user.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use hb_core::{HeartbeatStore, User};
use hb_db::Database;

use super::util::format_time;

pub fn run<W: Write>(writer: &mut W, db: &Database, db_path: &Path, user: &User) -> Result<()> {
    writeln!(writer, "Heartbeat tracker status")?;
    writeln!(writer, "Database: {}", db_path.display())?;
    writeln!(writer, "User: {}", user.id)?;

    let count = db.count_heartbeats(&user.id)?;
    let first = db.get_first_by_user(&user.id)?;
    let last = db.get_last_by_user(&user.id)?;
    let (Some(first), Some(last)) = (first, last) else {
        writeln!(writer, "No heartbeats recorded.")?;
        return Ok(());
    };

    writeln!(writer, "Heartbeats: {count}")?;
    writeln!(writer, "First: {}", format_time(first.time, user))?;
    writeln!(
        writer,
        "Last: {} ({}, {})",
        format_time(last.time, user),
        last.project,
        last.entity
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use crate::commands::fixtures::{at, seed_minute, user};

    #[test]
    fn status_reports_first_and_last_heartbeat() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("hb.db");
        let db = Database::open(&db_path).unwrap();
        seed_minute(&db, "wakapi", at(9, 0));
        seed_minute(&db, "anchr", at(10, 0));

        let mut output = Vec::new();
        run(&mut output, &db, &db_path, &user()).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/hb.db");
        assert_snapshot!(output, @r"
        Heartbeat tracker status
        Database: [TEMP]/hb.db
        User: alice
        Heartbeats: 6
        First: 2024-03-01 09:00:00
        Last: 2024-03-01 10:01:00 (anchr, main.go)
        ");
    }

    #[test]
    fn status_without_heartbeats() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, Path::new("/tmp/hb.db"), &user()).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Heartbeat tracker status
        Database: /tmp/hb.db
        User: alice
        No heartbeats recorded.
        ");
    }
}
