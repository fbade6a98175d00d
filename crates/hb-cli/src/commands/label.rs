//! Label commands: group projects under shared labels.

use std::io::Write;

use anyhow::{Result, bail};

use hb_core::{LabelStore, ProjectLabel, User};
use hb_db::Database;

pub fn add<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &User,
    project: &str,
    label: &str,
) -> Result<()> {
    if project.trim().is_empty() || label.trim().is_empty() {
        bail!("project and label must be non-empty");
    }

    let added = db.add_label(&ProjectLabel {
        user_id: user.id.clone(),
        project_key: project.to_string(),
        label: label.to_string(),
    })?;
    if added {
        writeln!(writer, "Labelled {project} as {label}")?;
    } else {
        writeln!(writer, "{project} is already labelled {label}")?;
    }
    Ok(())
}

/// Prints each label with its projects.
pub fn list<W: Write>(writer: &mut W, db: &Database, user: &User) -> Result<()> {
    let grouped = db.get_by_user_grouped_inverted(&user.id)?;
    if grouped.is_empty() {
        writeln!(writer, "No labels defined.")?;
        return Ok(());
    }
    for (label, members) in grouped {
        let projects: Vec<&str> = members.iter().map(|m| m.project_key.as_str()).collect();
        writeln!(writer, "{label}: {}", projects.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use crate::commands::fixtures::user;

    #[test]
    fn add_is_idempotent_and_list_groups_by_label() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        add(&mut output, &db, &user(), "wakapi", "work").unwrap();
        add(&mut output, &db, &user(), "anchr", "work").unwrap();
        add(&mut output, &db, &user(), "dotfiles", "hobby").unwrap();
        add(&mut output, &db, &user(), "wakapi", "work").unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Labelled wakapi as work
        Labelled anchr as work
        Labelled dotfiles as hobby
        wakapi is already labelled work
        ");

        let mut listed = Vec::new();
        list(&mut listed, &db, &user()).unwrap();
        assert_snapshot!(String::from_utf8(listed).unwrap(), @r"
        hobby: dotfiles
        work: anchr, wakapi
        ");
    }
}
