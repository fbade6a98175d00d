//! Alias commands: map raw keys onto canonical ones.

use std::io::Write;

use anyhow::{Result, bail};

use hb_core::{Alias, SummaryKind, User};
use hb_db::Database;

pub fn add<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &User,
    kind: SummaryKind,
    key: &str,
    value: &str,
) -> Result<()> {
    if kind == SummaryKind::Label {
        bail!("labels cannot be aliased; use `hb label add` instead");
    }
    if key.trim().is_empty() || value.trim().is_empty() {
        bail!("alias key and value must be non-empty");
    }

    db.add_alias(&Alias {
        user_id: user.id.clone(),
        kind,
        key: key.to_string(),
        value: value.to_string(),
    })?;
    writeln!(writer, "{kind}: {value} -> {key}")?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, db: &Database, user: &User) -> Result<()> {
    let aliases = db.list_aliases(&user.id)?;
    if aliases.is_empty() {
        writeln!(writer, "No aliases defined.")?;
        return Ok(());
    }
    for alias in aliases {
        writeln!(writer, "{}: {} -> {}", alias.kind, alias.value, alias.key)?;
    }
    Ok(())
}
