//! The database handle (spec.md §3 "Database"): owns the native
//! environment/connection state behind one of the two bridges, plus a
//! flags word, an optional name, and a dialect string.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use rusqlite::Connection;

use crate::connection_string::parse_connection_string;
use crate::cursor::Cursor;
use crate::drivers::engine::{open_file_connection, open_in_memory_connection, EngineBridge};
use crate::drivers::enterprise::{EnterpriseBridge, EnterpriseConnection};
use crate::drivers::DriverBridge;
use crate::error::{Error, Result};

/// Bits describing a database's ownership and connectivity (spec.md §3
/// "flags word (`Owner`, `Connected`)").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DatabaseFlags(u8);

impl DatabaseFlags {
    pub const OWNER: DatabaseFlags = DatabaseFlags(0x01);
    pub const CONNECTED: DatabaseFlags = DatabaseFlags(0x02);

    const fn empty() -> Self {
        DatabaseFlags(0)
    }

    pub const fn contains(self, other: DatabaseFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DatabaseFlags {
    type Output = DatabaseFlags;
    fn bitor(self, rhs: DatabaseFlags) -> DatabaseFlags {
        DatabaseFlags(self.0 | rhs.0)
    }
}

/// Database connect options (spec.md §6 "Database connect options"):
/// `file` (path, or driver connection string for the enterprise backend)
/// and `create` (create-if-missing, embedded engine only).
#[derive(Clone, Debug, Default)]
pub struct ConnectArguments {
    pub file: Option<PathBuf>,
    pub create: bool,
}

impl ConnectArguments {
    pub fn for_file(path: impl Into<PathBuf>, create: bool) -> Self {
        ConnectArguments { file: Some(path.into()), create }
    }
}

/// Owns the native environment/connection handles, a flags word, an
/// optional name, and a dialect string (spec.md §3 "Database"). Non-owner
/// instances are not currently constructed by this crate (no external
/// handle-sharing API is exposed), but the flag exists so a future wrapper
/// can flip it without changing this type's shape.
#[derive(Debug)]
pub struct Database {
    backend: BackendHandle,
    flags: DatabaseFlags,
    name: Option<String>,
    dialect: String,
}

/// The native environment/connection state a `Database` owns for its
/// lifetime (spec.md §3 "Database. Owns the native environment/connection
/// handles"). Held once and shared (via `Rc`) with every cursor pulled from
/// this database, rather than each cursor reconnecting from scratch, so
/// concurrent cursors against the same database see the same data (spec.md
/// §5 "concurrent cursors against the same database").
#[derive(Debug)]
enum BackendHandle {
    Engine(Rc<Connection>),
    Enterprise(Rc<EnterpriseConnection>),
}

impl Database {
    /// Opens the embedded engine against `arguments.file` (or `:memory:` if
    /// absent), per spec.md §6.
    pub fn open_engine(arguments: ConnectArguments) -> Result<Self> {
        let conn = match &arguments.file {
            Some(path) => {
                probe_engine_path(path, arguments.create)?;
                open_file_connection(path, arguments.create)?
            }
            None => open_in_memory_connection()?,
        };
        Ok(Database {
            backend: BackendHandle::Engine(Rc::new(conn)),
            flags: DatabaseFlags::OWNER | DatabaseFlags::CONNECTED,
            name: None,
            dialect: "sqlite".to_owned(),
        })
    }

    /// Opens the enterprise driver against a raw or `key=value;...`
    /// connection string (spec.md §6).
    pub fn open_enterprise(connect_string: &str) -> Result<Self> {
        let attributes = parse_connection_string(connect_string);
        let dialect = attributes
            .get("driver")
            .cloned()
            .unwrap_or_else(|| "odbc".to_owned());
        let conn = EnterpriseConnection::connect(connect_string)?;
        Ok(Database {
            backend: BackendHandle::Enterprise(Rc::new(conn)),
            flags: DatabaseFlags::OWNER | DatabaseFlags::CONNECTED,
            name: None,
            dialect,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.flags.contains(DatabaseFlags::CONNECTED)
    }

    pub fn is_owner(&self) -> bool {
        self.flags.contains(DatabaseFlags::OWNER)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Sets a recognized option (spec.md §4.6 `set(option, value)`:
    /// "recognized options: `dialect`").
    pub fn set(&mut self, option: &str, value: &str) -> Result<()> {
        match option {
            "dialect" => {
                self.dialect = value.to_owned();
                Ok(())
            }
            other => Err(Error::state(format!("unrecognized option {other:?}"))),
        }
    }

    /// Opens a fresh cursor attached to this database, via a new driver
    /// bridge instance sharing this database's live connection (spec.md
    /// §4.6 `get_cursor`).
    pub fn get_cursor(&self) -> Result<Cursor> {
        let bridge: Box<dyn DriverBridge> = match &self.backend {
            BackendHandle::Engine(conn) => Box::new(EngineBridge::new(Rc::clone(conn))),
            BackendHandle::Enterprise(conn) => Box::new(EnterpriseBridge::new(Rc::clone(conn))?),
        };
        Ok(Cursor::new(bridge))
    }

    /// Closes the database. Non-owner instances never held a handle to
    /// release, so this only flips the flag (spec.md §3 "Non-owner
    /// instances... must not release them").
    pub fn close(&mut self) {
        self.flags = DatabaseFlags::empty();
    }
}

fn probe_engine_path(path: &Path, create: bool) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if create {
        Ok(())
    } else {
        Err(Error::driver(format!("database file not found: {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_engine_opens_and_connects() {
        let db = Database::open_engine(ConnectArguments::default()).unwrap();
        assert!(db.is_connected());
        assert_eq!(db.dialect(), "sqlite");
    }

    #[test]
    fn get_cursor_round_trips_a_query() {
        let db = Database::open_engine(ConnectArguments::default()).unwrap();
        let mut cursor = db.get_cursor().unwrap();
        cursor.open_sql("SELECT 1").unwrap();
        assert!(cursor.is_valid_row());
    }

    #[test]
    fn set_dialect_option() {
        let mut db = Database::open_engine(ConnectArguments::default()).unwrap();
        db.set("dialect", "sqlite3").unwrap();
        assert_eq!(db.dialect(), "sqlite3");
        assert!(db.set("nope", "x").is_err());
    }

    #[test]
    fn missing_file_without_create_is_an_error() {
        let args = ConnectArguments::for_file("/nonexistent/path/does-not-exist.db", false);
        assert!(Database::open_engine(args).is_err());
    }

    #[test]
    fn concurrent_cursors_share_the_same_in_memory_database() {
        let db = Database::open_engine(ConnectArguments::default()).unwrap();
        let mut writer = db.get_cursor().unwrap();
        writer.prepare("CREATE TABLE t(a INTEGER)").unwrap();
        writer.execute().unwrap();
        writer.prepare("INSERT INTO t VALUES (1)").unwrap();
        writer.execute().unwrap();

        // A second cursor pulled from the same database must see the row
        // the first cursor just wrote, not an empty, unrelated database.
        let mut reader = db.get_cursor().unwrap();
        reader.open_sql("SELECT a FROM t").unwrap();
        assert!(reader.is_valid_row());
    }
}
