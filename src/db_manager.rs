use crate::protocol::{PersistedEntry, SetlistInfo};
use rusqlite::{params, Connection};
use std::path::Path;

/// Durable storage for saved setlist order and selections.
pub trait SetlistStore {
    fn save_setlist(
        &mut self,
        setlist_id: &str,
        name: &str,
        entries: &[PersistedEntry],
    ) -> Result<(), String>;
    fn load_setlist(&self, setlist_id: &str) -> Result<Vec<PersistedEntry>, String>;
}

pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    pub fn new(db_path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    rusqlite::Error::InvalidPath(
                        format!("{}: {err}", parent.display()).into(),
                    )
                })?;
            }
        }
        let conn = Connection::open(db_path)?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        Ok(db_manager)
    }

    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        Ok(db_manager)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS setlists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS setlist_entries (
                setlist_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                song_id TEXT NOT NULL,
                variant_key TEXT NOT NULL,
                reference_url TEXT NOT NULL DEFAULT '',
                PRIMARY KEY(setlist_id, position),
                FOREIGN KEY(setlist_id) REFERENCES setlists(id)
            )",
            [],
        )?;
        Ok(())
    }

    pub fn get_all_setlists(&self) -> Result<Vec<SetlistInfo>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM setlists ORDER BY name ASC")?;
        let setlist_iter = stmt.query_map([], |row| {
            Ok(SetlistInfo {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut setlists = Vec::new();
        for setlist in setlist_iter {
            setlists.push(setlist?);
        }
        Ok(setlists)
    }

    /// Replaces the stored rows of `setlist_id` in one transaction.
    pub fn replace_entries(
        &mut self,
        setlist_id: &str,
        name: &str,
        entries: &[PersistedEntry],
    ) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO setlists (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![setlist_id, name],
        )?;
        tx.execute(
            "DELETE FROM setlist_entries WHERE setlist_id = ?1",
            params![setlist_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO setlist_entries (setlist_id, position, song_id, variant_key, reference_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    setlist_id,
                    entry.position as i64,
                    entry.song_id,
                    entry.selected_variant_key,
                    entry.selected_reference_url
                ])?;
            }
        }
        tx.commit()
    }

    pub fn get_entries(&self, setlist_id: &str) -> Result<Vec<PersistedEntry>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT song_id, position, variant_key, reference_url FROM setlist_entries
             WHERE setlist_id = ?1 ORDER BY position ASC",
        )?;
        let entry_iter = stmt.query_map(params![setlist_id], |row| {
            Ok(PersistedEntry {
                song_id: row.get(0)?,
                position: row.get::<_, i64>(1)? as usize,
                selected_variant_key: row.get(2)?,
                selected_reference_url: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for entry in entry_iter {
            entries.push(entry?);
        }
        Ok(entries)
    }

    pub fn delete_setlist(&mut self, setlist_id: &str) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM setlist_entries WHERE setlist_id = ?1",
            params![setlist_id],
        )?;
        tx.execute("DELETE FROM setlists WHERE id = ?1", params![setlist_id])?;
        tx.commit()
    }
}

impl SetlistStore for DbManager {
    fn save_setlist(
        &mut self,
        setlist_id: &str,
        name: &str,
        entries: &[PersistedEntry],
    ) -> Result<(), String> {
        self.replace_entries(setlist_id, name, entries)
            .map_err(|err| format!("failed to save setlist {setlist_id}: {err}"))
    }

    fn load_setlist(&self, setlist_id: &str) -> Result<Vec<PersistedEntry>, String> {
        self.get_entries(setlist_id)
            .map_err(|err| format!("failed to load setlist {setlist_id}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{DbManager, SetlistStore};
    use crate::protocol::PersistedEntry;

    fn entry(song_id: &str, position: usize, variant: &str, url: &str) -> PersistedEntry {
        PersistedEntry {
            song_id: song_id.to_string(),
            position,
            selected_variant_key: variant.to_string(),
            selected_reference_url: url.to_string(),
        }
    }

    #[test]
    fn test_save_and_load_preserves_order_and_selection() {
        let mut db = DbManager::new_in_memory().expect("in-memory db");
        let entries = vec![
            entry("grace", 0, "G", "https://youtu.be/aaaaaaaaaaa"),
            entry("holy", 1, "D", ""),
            entry("grace", 2, "G", "https://youtu.be/aaaaaaaaaaa"),
        ];
        db.save_setlist("sunday", "Sunday service", &entries)
            .expect("save should succeed");
        assert_eq!(db.load_setlist("sunday").expect("load"), entries);
        let setlists = db.get_all_setlists().expect("list setlists");
        assert_eq!(setlists.len(), 1);
        assert_eq!(setlists[0].name, "Sunday service");
    }

    #[test]
    fn test_save_replaces_previous_rows_and_renames() {
        let mut db = DbManager::new_in_memory().expect("in-memory db");
        db.save_setlist(
            "sunday",
            "Draft",
            &[entry("a", 0, "C", ""), entry("b", 1, "C", "")],
        )
        .expect("first save");
        db.save_setlist("sunday", "Final", &[entry("b", 0, "C", "")])
            .expect("second save");
        assert_eq!(
            db.load_setlist("sunday").expect("load"),
            vec![entry("b", 0, "C", "")]
        );
        assert_eq!(db.get_all_setlists().expect("list")[0].name, "Final");
    }

    #[test]
    fn test_delete_setlist_removes_rows() {
        let mut db = DbManager::new_in_memory().expect("in-memory db");
        db.save_setlist("sunday", "Sunday", &[entry("a", 0, "C", "")])
            .expect("save");
        db.delete_setlist("sunday").expect("delete");
        assert!(db.load_setlist("sunday").expect("load").is_empty());
        assert!(db.get_all_setlists().expect("list").is_empty());
    }
}
