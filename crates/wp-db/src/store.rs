use crate::audit_repo::AuditRepo;
use crate::channel_repo::ChannelRepo;
use crate::checkin_repo::CheckInRepo;
use crate::event_repo::EventRepo;
use crate::location_repo::LocationRepo;
use crate::notification_repo::NotificationRepo;
use crate::schema;
use crate::util::storage;
use crate::zone_repo::ZoneRepo;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use wp_core::error::StoreError;
use wp_core::store::{Store, StoreProvider};
use wp_core::EngineError;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for DbStore {
    type Zones<'a>
        = ZoneRepo<'a>
    where
        Self: 'a;
    type CheckIns<'a>
        = CheckInRepo<'a>
    where
        Self: 'a;
    type Notifications<'a>
        = NotificationRepo<'a>
    where
        Self: 'a;
    type Channels<'a>
        = ChannelRepo<'a>
    where
        Self: 'a;
    type Audit<'a>
        = AuditRepo<'a>
    where
        Self: 'a;
    type Events<'a>
        = EventRepo<'a>
    where
        Self: 'a;
    type Locations<'a>
        = LocationRepo<'a>
    where
        Self: 'a;

    fn zones(&self) -> Self::Zones<'_> {
        ZoneRepo::new(&self.conn)
    }

    fn check_ins(&self) -> Self::CheckIns<'_> {
        CheckInRepo::new(&self.conn)
    }

    fn notifications(&self) -> Self::Notifications<'_> {
        NotificationRepo::new(&self.conn)
    }

    fn channels(&self) -> Self::Channels<'_> {
        ChannelRepo::new(&self.conn)
    }

    fn audit(&self) -> Self::Audit<'_> {
        AuditRepo::new(&self.conn)
    }

    fn events(&self) -> Self::Events<'_> {
        EventRepo::new(&self.conn)
    }

    fn locations(&self) -> Self::Locations<'_> {
        LocationRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Self) -> Result<T, EngineError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE").map_err(storage)?;
        match f(self) {
            Ok(value) => {
                if let Err(err) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(storage(err).into());
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Opens a fresh connection per unit of work against one database file.
/// Every connection sees the same WAL-mode database, so writers serialize on
/// `BEGIN IMMEDIATE` and unique constraints arbitrate races.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    path: PathBuf,
}

impl SqliteProvider {
    /// Creates the parent directory if needed and applies migrations once.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| StoreError::Storage {
                message: format!("create {}: {err}", parent.display()),
            })?;
        }
        schema::open_and_migrate(&path).map_err(storage)?;
        tracing::debug!(path = %path.display(), "database ready");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreProvider for SqliteProvider {
    type Store = DbStore;

    fn open(&self) -> Result<DbStore, StoreError> {
        schema::open(&self.path).map(DbStore::new).map_err(storage)
    }
}
