use crate::TranslationError;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Caches translated cores in a SQLite database, shared across runs.
pub struct Cache {
    conn: Connection,
    src_lang_lc: String,
    dst_lang_lc: String,
}

impl Cache {
    pub fn new(db_path: &Path, src_lang: &str, dst_lang: &str) -> Result<Self, TranslationError> {
        let is_new = !db_path.exists();

        let conn = Connection::open(db_path)?;

        if is_new {
            conn.execute_batch(
                "CREATE TABLE translated (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    src_text     TEXT NOT NULL,
                    dst_text     TEXT NOT NULL,
                    src_lang_lc  TEXT NOT NULL,
                    dst_lang_lc  TEXT NOT NULL
                );
                CREATE UNIQUE INDEX translated_lookup
                    ON translated (src_text, src_lang_lc, dst_lang_lc);",
            )?;
            log::info!("Created translation cache at {}", db_path.display());
        };
        Ok(Self {
            conn,
            src_lang_lc: src_lang.trim().to_lowercase(),
            dst_lang_lc: dst_lang.trim().to_lowercase(),
        })
    }

    pub fn get(&self, src: &str) -> Result<Option<String>, TranslationError> {
        let dst = self
            .conn
            .query_row(
                "SELECT dst_text
                FROM translated
                WHERE src_text = ?
                  AND src_lang_lc = ?
                  AND dst_lang_lc = ?",
                [src, self.src_lang_lc.as_str(), self.dst_lang_lc.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(dst)
    }

    /// Inserts a new cache entry unless one already exists.
    pub fn insert(&mut self, src: &str, dst: &str) -> Result<(), TranslationError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO translated (src_text, dst_text, src_lang_lc, dst_lang_lc)
            VALUES (?, ?, ?, ?)",
            [src, dst, self.src_lang_lc.as_str(), self.dst_lang_lc.as_str()],
        )?;
        Ok(())
    }
}
