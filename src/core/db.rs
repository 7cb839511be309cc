use std::path::Path;

use anyhow::Result;
use tokio_rusqlite::Connection;

pub const DB_FILE_NAME: &str = "rescal.sqlite3";

/// Open the sqlite db stored in the `db_path` directory
pub async fn async_db(db_path: &str) -> Result<Connection> {
    let path = Path::new(db_path).join(DB_FILE_NAME);
    let db = Connection::open(path).await?;
    Ok(db)
}

pub fn initialize_db(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS auth (
             id TEXT PRIMARY KEY,
             service TEXT NOT NULL,
             refresh_token TEXT NOT NULL
         );
         COMMIT;",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_db_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let db = async_db(dir.path().to_str().unwrap()).await.unwrap();

        let count = db
            .call(|conn| {
                initialize_db(conn)?;
                initialize_db(conn)?;
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'auth'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .unwrap();

        assert_eq!(count, 1);
    }
}
