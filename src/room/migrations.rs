use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema steps in order; `user_version` records how many have run.
const MIGRATIONS: &[&str] = &[
    include_str!("schemas/schema_v1.sql"),
    include_str!("schemas/schema_v2.sql"),
];

pub fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let applied: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;
    let target = schema_version();

    if applied > target {
        bail!("card database is at schema {applied}, this build only knows {target}");
    }
    if applied == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(applied.max(0) as usize) {
        tx.execute_batch(sql)
            .with_context(|| format!("migration to schema {} failed", index + 1))?;
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    log::debug!("card database migrated from schema {applied} to {target}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(conn: &Connection) -> i32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(version(&conn), schema_version());

        // coord_space arrives in v2
        conn.execute(
            "INSERT INTO cards (id, created_at, owner_id, room_id, media_payload, x, y, coord_space)
             VALUES ('a', '2026-01-01T00:00:00Z', 'u', 'r', 'p', 1.0, 2.0, 'pixels')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_v1_database_is_upgraded_in_place() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0]).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();
        conn.execute(
            "INSERT INTO cards (id, created_at, owner_id, room_id, media_payload, x, y)
             VALUES ('old', '2025-01-01T00:00:00Z', 'u', 'r', 'p', 0.5, 0.5)",
            [],
        )
        .unwrap();

        run_migrations(&mut conn).unwrap();
        let tag: Option<String> = conn
            .query_row("SELECT coord_space FROM cards WHERE id = 'old'", [], |row| row.get(0))
            .unwrap();
        assert!(tag.is_none());
        assert_eq!(version(&conn), 2);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", schema_version() + 1)
            .unwrap();
        assert!(run_migrations(&mut conn).is_err());
    }
}
