//! SQLite-backed store backend.
//!
//! Persistent snapshot store using tokio-rusqlite, which runs database
//! operations on a background thread. WAL mode is enabled for concurrent
//! access; entry puts are UPSERTs and batch puts run in one transaction.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::{Connection, params, rusqlite};

use super::{Generation, SnapshotStore, migrations};
use crate::{Error, ResourceKey, Snapshot};

/// Persistent snapshot store on a single SQLite database.
///
/// Generations are rows of the `generations` table; their entries live in
/// `entries`, keyed by `(generation, key)`.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a store at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory store for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;
                 PRAGMA foreign_keys=ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::from)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn open(&self, label: &str) -> Result<Arc<dyn Generation>, Error> {
        let owned = label.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO generations (label, created_at) VALUES (?1, ?2)
                     ON CONFLICT(label) DO NOTHING",
                    params![owned, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Arc::new(SqliteGeneration {
            label: label.to_string(),
            conn: self.conn.clone(),
        }))
    }

    async fn labels(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT label FROM generations ORDER BY label")?;
                let labels = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(labels)
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, label: &str) -> Result<bool, Error> {
        let owned = label.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                conn.execute("DELETE FROM entries WHERE generation = ?1", params![owned])
                    .map_err(Error::from)?;
                let removed = conn
                    .execute("DELETE FROM generations WHERE label = ?1", params![owned])
                    .map_err(Error::from)?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }
}

struct SqliteGeneration {
    label: String,
    conn: Connection,
}

fn encode_headers(snapshot: &Snapshot) -> Result<String, Error> {
    serde_json::to_string(&snapshot.headers).map_err(|e| Error::Store(e.to_string()))
}

fn decode_row(status: i64, headers_json: String, body: Vec<u8>) -> Result<Snapshot, Error> {
    let headers = serde_json::from_str(&headers_json).map_err(|e| Error::Store(e.to_string()))?;
    Ok(Snapshot::new(status as u16, headers, Bytes::from(body)))
}

const UPSERT_ENTRY: &str = "INSERT INTO entries (generation, key, status, headers_json, body, stored_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(generation, key) DO UPDATE SET
         status = excluded.status,
         headers_json = excluded.headers_json,
         body = excluded.body,
         stored_at = excluded.stored_at";

#[async_trait]
impl Generation for SqliteGeneration {
    fn label(&self) -> &str {
        &self.label
    }

    async fn put(&self, key: &ResourceKey, snapshot: Snapshot) -> Result<(), Error> {
        let label = self.label.clone();
        let key = key.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let headers_json = encode_headers(&snapshot)?;
                conn.execute(
                    UPSERT_ENTRY,
                    params![
                        label,
                        key,
                        snapshot.status as i64,
                        headers_json,
                        snapshot.body.to_vec(),
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(Error::from)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, entries: Vec<(ResourceKey, Snapshot)>) -> Result<(), Error> {
        let label = self.label.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction().map_err(Error::from)?;
                let stored_at = chrono::Utc::now().to_rfc3339();
                for (key, snapshot) in &entries {
                    let headers_json = encode_headers(snapshot)?;
                    tx.execute(
                        UPSERT_ENTRY,
                        params![
                            label,
                            key.as_str(),
                            snapshot.status as i64,
                            headers_json,
                            snapshot.body.to_vec(),
                            stored_at,
                        ],
                    )
                    .map_err(Error::from)?;
                }
                tx.commit().map_err(Error::from)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn lookup(&self, key: &ResourceKey) -> Result<Option<Snapshot>, Error> {
        let label = self.label.clone();
        let key = key.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<Option<Snapshot>, Error> {
                let result = conn.query_row(
                    "SELECT status, headers_json, body FROM entries
                     WHERE generation = ?1 AND key = ?2",
                    params![label, key],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                        ))
                    },
                );

                match result {
                    Ok((status, headers_json, body)) => {
                        decode_row(status, headers_json, body).map(Some)
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &ResourceKey) -> Result<bool, Error> {
        let label = self.label.clone();
        let key = key.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let removed = conn
                    .execute(
                        "DELETE FROM entries WHERE generation = ?1 AND key = ?2",
                        params![label, key],
                    )
                    .map_err(Error::from)?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<ResourceKey>, Error> {
        let label = self.label.clone();
        self.conn
            .call(move |conn| -> Result<Vec<ResourceKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key FROM entries WHERE generation = ?1 ORDER BY key",
                )?;
                let keys = stmt
                    .query_map(params![label], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(keys.into_iter().map(ResourceKey::from_raw).collect())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;
    use url::Url;

    fn key(path: &str) -> ResourceKey {
        let url = Url::parse(&format!("https://example.com{path}")).unwrap();
        ResourceKey::new(Method::Get, &url)
    }

    fn snapshot(body: &str) -> Snapshot {
        Snapshot::new(
            200,
            vec![("content-type".to_string(), "text/html".to_string())],
            body.as_bytes().to_vec(),
        )
    }

    #[tokio::test]
    async fn test_round_trip_preserves_snapshot() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let current = store.open("v1").await.unwrap();

        let stored = snapshot("<html>app</html>");
        current.put(&key("/index.html"), stored.clone()).await.unwrap();

        let found = current.lookup(&key("/index.html")).await.unwrap().unwrap();
        assert_eq!(found.status, stored.status);
        assert_eq!(found.headers, stored.headers);
        assert_eq!(found.body, stored.body);
    }

    #[tokio::test]
    async fn test_lookup_miss_is_none() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let current = store.open("v1").await.unwrap();
        assert!(current.lookup(&key("/missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let current = store.open("v1").await.unwrap();

        current.put(&key("/a"), snapshot("old")).await.unwrap();
        current.put(&key("/a"), snapshot("new")).await.unwrap();

        let found = current.lookup(&key("/a")).await.unwrap().unwrap();
        assert_eq!(found.body, "new".as_bytes());
        assert_eq!(current.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_all_batch() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let current = store.open("v1").await.unwrap();

        current
            .put_all(vec![
                (key("/"), snapshot("root")),
                (key("/index.html"), snapshot("index")),
                (key("/manifest.json"), snapshot("{}")),
            ])
            .await
            .unwrap();

        assert_eq!(current.keys().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let v1 = store.open("v1").await.unwrap();
        let v2 = store.open("v2").await.unwrap();

        v1.put(&key("/a"), snapshot("v1 body")).await.unwrap();

        assert!(v2.lookup(&key("/a")).await.unwrap().is_none());
        assert!(v1.lookup(&key("/a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_generation_drops_entries() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let v1 = store.open("v1").await.unwrap();
        v1.put(&key("/a"), snapshot("a")).await.unwrap();
        store.open("v2").await.unwrap();

        assert!(store.remove("v1").await.unwrap());
        assert_eq!(store.labels().await.unwrap(), vec!["v2".to_string()]);

        // re-opening the removed label starts empty
        let reopened = store.open("v1").await.unwrap();
        assert!(reopened.lookup(&key("/a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_generation() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert!(!store.remove("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let current = store.open("v1").await.unwrap();
        current.put(&key("/a"), snapshot("a")).await.unwrap();

        assert!(current.delete(&key("/a")).await.unwrap());
        assert!(!current.delete(&key("/a")).await.unwrap());
        assert!(current.lookup(&key("/a")).await.unwrap().is_none());
    }
}
