use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::schema;
use super::{Observation, StoreError, WindowStats};
use crate::registry::{Monitor, MonitorKey, MonitorRegistry};

/// SQLite-backed monitor registry and observation log.
///
/// One connection is shared by every probe task, the purger and all readers.
/// Access is serialized by the internal mutex and every call runs on the
/// blocking pool, so callers never hold the runtime while SQLite works.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Option<Connection>>>,
}

fn write_err(e: rusqlite::Error) -> StoreError {
    StoreError::Write(e.to_string())
}

fn read_err(e: rusqlite::Error) -> StoreError {
    StoreError::Read(e.to_string())
}

fn open_err(e: rusqlite::Error) -> StoreError {
    StoreError::Open(e.to_string())
}

fn row_to_observation(row: &rusqlite::Row<'_>) -> Result<Observation, rusqlite::Error> {
    Ok(Observation {
        timestamp: row.get(0)?,
        time: row.get(1)?,
        response: row.get(2)?,
    })
}

fn monitor_exists(conn: &Connection, key: &MonitorKey) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT 1 FROM monitors WHERE grp = ?1 AND name = ?2",
        params![key.group, key.name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(read_err)
}

impl Store {
    /// Open (or create) the database at `path`.
    ///
    /// Creates parent directories, enables WAL and foreign keys, and
    /// initializes the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Open(e.to_string()))?;
            }
        }

        let conn = Connection::open(path).map_err(open_err)?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "Database initialized");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory().map_err(open_err)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(open_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(open_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(open_err)?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(open_err)?;

        schema::initialize_schema(&conn).map_err(open_err)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }

    /// Make the registry table hold exactly `monitors`, atomically.
    ///
    /// Monitors absent from the new list are deleted and their observations
    /// cascade with them. Monitors present in both keep their history and
    /// take the new URL. Either the whole replacement commits or nothing does.
    pub async fn replace_monitors(&self, monitors: &[Monitor]) -> Result<usize, StoreError> {
        let monitors = MonitorRegistry::new(monitors.iter().cloned())?.monitors();
        let wanted: HashSet<MonitorKey> = monitors.iter().map(Monitor::key).collect();

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(write_err)?;

            let existing: Vec<MonitorKey> = {
                let mut stmt = tx
                    .prepare("SELECT grp, name FROM monitors")
                    .map_err(write_err)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(MonitorKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })
                    .map_err(write_err)?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(write_err)?;
                rows
            };

            let mut removed = 0usize;
            {
                let mut delete = tx
                    .prepare("DELETE FROM monitors WHERE grp = ?1 AND name = ?2")
                    .map_err(write_err)?;
                for key in existing.iter().filter(|k| !wanted.contains(*k)) {
                    removed += delete
                        .execute(params![key.group, key.name])
                        .map_err(write_err)?;
                }

                let mut upsert = tx
                    .prepare(
                        "INSERT INTO monitors (grp, name, url) VALUES (?1, ?2, ?3) \
                         ON CONFLICT (grp, name) DO UPDATE SET url = excluded.url",
                    )
                    .map_err(write_err)?;
                for m in &monitors {
                    upsert
                        .execute(params![m.group, m.name, m.url])
                        .map_err(write_err)?;
                }
            }

            tx.commit().map_err(write_err)?;
            info!(registered = monitors.len(), removed, "Monitor registry replaced");
            Ok(monitors.len())
        })
        .await
    }

    pub async fn append_observation(
        &self,
        key: &MonitorKey,
        observation: &Observation,
    ) -> Result<(), StoreError> {
        let key = key.clone();
        let obs = observation.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO observations (grp, name, timestamp, time, response) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key.group, key.name, obs.timestamp, obs.time, obs.response],
            )
            .map_err(|e| StoreError::Write(format!("{}: {}", key, e)))?;
            Ok(())
        })
        .await
    }

    /// Observations with `start <= timestamp <= end`, oldest first.
    pub async fn query_observations(
        &self,
        key: &MonitorKey,
        start: i64,
        end: i64,
    ) -> Result<Vec<Observation>, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            if !monitor_exists(conn, &key)? {
                return Err(StoreError::NotFound(key));
            }
            let mut stmt = conn
                .prepare_cached(
                    "SELECT timestamp, time, response FROM observations \
                     WHERE grp = ?1 AND name = ?2 AND timestamp >= ?3 AND timestamp <= ?4 \
                     ORDER BY timestamp ASC, id ASC",
                )
                .map_err(read_err)?;
            let rows = stmt
                .query_map(params![key.group, key.name, start, end], row_to_observation)
                .map_err(read_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(read_err)?;
            Ok(rows)
        })
        .await
    }

    /// Most recent observation, or `None` when the monitor has no data.
    pub async fn latest_observation(
        &self,
        key: &MonitorKey,
    ) -> Result<Option<Observation>, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT timestamp, time, response FROM observations \
                 WHERE grp = ?1 AND name = ?2 \
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                params![key.group, key.name],
                row_to_observation,
            )
            .optional()
            .map_err(read_err)
        })
        .await
    }

    /// Count, 2xx count and mean elapsed time for observations at or after `since`.
    pub async fn window_stats(
        &self,
        key: &MonitorKey,
        since: i64,
    ) -> Result<WindowStats, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT COUNT(*), \
                        COALESCE(SUM(CASE WHEN response LIKE '2%' THEN 1 ELSE 0 END), 0), \
                        COALESCE(AVG(time), 0.0) \
                 FROM observations \
                 WHERE grp = ?1 AND name = ?2 AND timestamp >= ?3",
                params![key.group, key.name, since],
                |row| {
                    Ok(WindowStats {
                        count: row.get::<_, i64>(0)?.max(0) as u64,
                        up: row.get::<_, i64>(1)?.max(0) as u64,
                        avg_time: row.get(2)?,
                    })
                },
            )
            .map_err(read_err)
        })
        .await
    }

    /// Delete every observation with `timestamp < cutoff`. Returns rows deleted.
    pub async fn purge_before(&self, cutoff: i64) -> Result<u64, StoreError> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM observations WHERE timestamp < ?1", params![cutoff])
                .map_err(write_err)?;
            debug!(cutoff, deleted, "Purged observations");
            Ok(deleted as u64)
        })
        .await
    }

    pub async fn contains(&self, key: &MonitorKey) -> Result<bool, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| monitor_exists(conn, &key)).await
    }

    pub async fn observation_count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM observations", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as u64)
            .map_err(read_err)
        })
        .await
    }

    /// Drop the connection. Later calls fail with [`StoreError::Closed`].
    pub async fn close(&self) {
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || match conn.lock() {
            Ok(mut guard) => guard.take().is_some(),
            Err(_) => false,
        })
        .await
        .unwrap_or(false);
        if closed {
            info!("Database closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(timestamp: i64, time: f64, response: &str) -> Observation {
        Observation {
            timestamp,
            time,
            response: response.to_string(),
        }
    }

    fn acme_home() -> MonitorKey {
        MonitorKey::new("acme", "home")
    }

    async fn store_with(monitors: &[Monitor]) -> Store {
        let store = Store::open_in_memory().unwrap();
        store.replace_monitors(monitors).await.unwrap();
        store
    }

    async fn registered(store: &Store) -> Vec<Monitor> {
        store
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare("SELECT grp, name, url FROM monitors ORDER BY grp, name")
                    .map_err(read_err)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(Monitor::new(
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })
                    .map_err(read_err)?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(read_err)?;
                Ok(rows)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn replace_monitors_registers_sorted() {
        let store = store_with(&[
            Monitor::new("zeta", "a", "https://z.example"),
            Monitor::new("acme", "home", "https://acme.example"),
        ])
        .await;
        let listed = registered(&store).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].group, "acme");
        assert_eq!(listed[1].group, "zeta");
    }

    #[tokio::test]
    async fn membership_and_count() {
        let store = store_with(&[
            Monitor::new("acme", "web", "https://acme.example"),
            Monitor::new("acme", "api", "https://api.acme.example"),
            Monitor::new("globex", "web", "https://globex.example"),
        ])
        .await;

        assert!(store.contains(&MonitorKey::new("globex", "web")).await.unwrap());
        assert!(!store.contains(&MonitorKey::new("globex", "api")).await.unwrap());

        assert_eq!(store.observation_count().await.unwrap(), 0);
        store
            .append_observation(&MonitorKey::new("acme", "api"), &obs(1, 1.0, "200"))
            .await
            .unwrap();
        assert_eq!(store.observation_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_monitors_keeps_history_of_retained_monitors() {
        let monitors = [
            Monitor::new("acme", "home", "https://acme.example"),
            Monitor::new("acme", "api", "https://api.acme.example"),
        ];
        let store = store_with(&monitors).await;
        store.append_observation(&acme_home(), &obs(100, 1.0, "200")).await.unwrap();
        store.append_observation(&acme_home(), &obs(200, 2.0, "503")).await.unwrap();

        // A restart with the same configuration.
        assert_eq!(store.replace_monitors(&monitors).await.unwrap(), 2);

        let rows = store.query_observations(&acme_home(), 0, i64::MAX).await.unwrap();
        assert_eq!(rows, vec![obs(100, 1.0, "200"), obs(200, 2.0, "503")]);
        assert_eq!(registered(&store).await.len(), 2);
    }

    #[tokio::test]
    async fn replace_monitors_drops_removed_monitors_and_their_observations() {
        let store = store_with(&[
            Monitor::new("acme", "home", "https://acme.example"),
            Monitor::new("acme", "old", "https://old.example"),
        ])
        .await;
        let old = MonitorKey::new("acme", "old");
        store.append_observation(&old, &obs(100, 1.0, "200")).await.unwrap();
        store.append_observation(&acme_home(), &obs(100, 1.0, "200")).await.unwrap();

        store
            .replace_monitors(&[Monitor::new("acme", "home", "https://acme.example/v2")])
            .await
            .unwrap();

        assert!(!store.contains(&old).await.unwrap());
        assert!(matches!(
            store.query_observations(&old, 0, i64::MAX).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.observation_count().await.unwrap(), 1);
        let listed = registered(&store).await;
        assert_eq!(listed, vec![Monitor::new("acme", "home", "https://acme.example/v2")]);
    }

    #[tokio::test]
    async fn replace_monitors_rejects_duplicates_and_leaves_registry_untouched() {
        let store = store_with(&[Monitor::new("acme", "home", "https://acme.example")]).await;
        let err = store
            .replace_monitors(&[
                Monitor::new("acme", "api", "https://a.example"),
                Monitor::new("acme", "api", "https://b.example"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMonitor(_)));
        assert_eq!(
            registered(&store).await,
            vec![Monitor::new("acme", "home", "https://acme.example")]
        );
    }

    #[tokio::test]
    async fn append_for_unknown_monitor_is_write_error() {
        let store = store_with(&[]).await;
        let err = store
            .append_observation(&acme_home(), &obs(1, 1.0, "200"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Write(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn query_observations_is_inclusive_and_sorted() {
        let store = store_with(&[Monitor::new("acme", "home", "https://acme.example")]).await;
        for (ts, resp) in [(30, "200"), (10, "500"), (20, "200"), (40, "404"), (5, "200")] {
            store.append_observation(&acme_home(), &obs(ts, 1.0, resp)).await.unwrap();
        }

        let rows = store.query_observations(&acme_home(), 10, 30).await.unwrap();
        let stamps: Vec<i64> = rows.iter().map(|o| o.timestamp).collect();
        assert_eq!(stamps, vec![10, 20, 30]);

        let again = store.query_observations(&acme_home(), 10, 30).await.unwrap();
        assert_eq!(rows, again);
    }

    #[tokio::test]
    async fn query_observations_unknown_monitor_is_not_found() {
        let store = store_with(&[]).await;
        let err = store.query_observations(&acme_home(), 0, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(k) if k == acme_home()));
    }

    #[tokio::test]
    async fn latest_observation_is_max_timestamp_not_last_insert() {
        let store = store_with(&[Monitor::new("acme", "home", "https://acme.example")]).await;
        assert_eq!(store.latest_observation(&acme_home()).await.unwrap(), None);

        store.append_observation(&acme_home(), &obs(200, 5.0, "503")).await.unwrap();
        store.append_observation(&acme_home(), &obs(100, 5.0, "200")).await.unwrap();

        let latest = store.latest_observation(&acme_home()).await.unwrap().unwrap();
        assert_eq!(latest.timestamp, 200);
        assert_eq!(latest.response, "503");
    }

    #[tokio::test]
    async fn purge_before_is_strict_and_idempotent() {
        let store = store_with(&[
            Monitor::new("acme", "home", "https://acme.example"),
            Monitor::new("acme", "api", "https://acme.example/api"),
        ])
        .await;
        let api = MonitorKey::new("acme", "api");
        for ts in [10, 20, 30] {
            store.append_observation(&acme_home(), &obs(ts, 1.0, "200")).await.unwrap();
            store.append_observation(&api, &obs(ts, 1.0, "200")).await.unwrap();
        }

        assert_eq!(store.purge_before(20).await.unwrap(), 2);
        assert_eq!(store.purge_before(20).await.unwrap(), 0);

        for key in [acme_home(), api] {
            let rows = store.query_observations(&key, i64::MIN, i64::MAX).await.unwrap();
            assert!(rows.iter().all(|o| o.timestamp >= 20));
            assert_eq!(rows.len(), 2);
        }
    }

    #[tokio::test]
    async fn window_stats_counts_2xx_and_averages_time() {
        let store = store_with(&[Monitor::new("acme", "home", "https://acme.example")]).await;
        store.append_observation(&acme_home(), &obs(5, 100.0, "200")).await.unwrap();
        store.append_observation(&acme_home(), &obs(10, 10.0, "200")).await.unwrap();
        store.append_observation(&acme_home(), &obs(11, 20.0, "503")).await.unwrap();
        store
            .append_observation(&acme_home(), &obs(12, 30.0, "Error: connection refused"))
            .await
            .unwrap();

        let stats = store.window_stats(&acme_home(), 10).await.unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.up, 1);
        assert!((stats.avg_time - 20.0).abs() < 1e-9);

        let empty = store.window_stats(&acme_home(), 1_000).await.unwrap();
        assert_eq!(empty, WindowStats::default());
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let store = store_with(&[Monitor::new("acme", "home", "https://acme.example")]).await;
        store.close().await;
        let err = store
            .append_observation(&acme_home(), &obs(1, 1.0, "200"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }

    #[tokio::test]
    async fn observations_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");
        let monitors = [Monitor::new("acme", "home", "https://acme.example")];

        {
            let store = Store::open(&path).unwrap();
            store.replace_monitors(&monitors).await.unwrap();
            store.append_observation(&acme_home(), &obs(42, 1.5, "200")).await.unwrap();
            store.close().await;
        }

        let store = Store::open(&path).unwrap();
        store.replace_monitors(&monitors).await.unwrap();
        let rows = store.query_observations(&acme_home(), 0, 100).await.unwrap();
        assert_eq!(rows, vec![obs(42, 1.5, "200")]);
    }
}
