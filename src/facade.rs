//! Polymorphic façade (spec.md §4.6): re-expresses the original's
//! multiple-inheritance reference-counted interface overlay as a trait held
//! behind a thin, non-atomic `Rc<RefCell<_>>` shell (spec.md Design Notes
//! §9). This is the one seam where the crate's idiomatic `Result<T, Error>`
//! degrades to the spec's `(ok, message)` pair (spec.md §6 "Error
//! strings").

use std::cell::RefCell;
use std::rc::Rc;

use crate::cursor::Cursor;
use crate::database::{ConnectArguments, Database};
use crate::error::{to_ok_message, Error, OkMessage, Result};
use crate::variant::{Variant, VariantView};

/// Component GUIDs used by `query_interface` (spec.md §6 "Component
/// GUIDs").
pub mod guid {
    pub const CURSOR: &str = "98E01E5F-08E7-47D3-B048-DC9F70B97B66";
    pub const DATABASE: &str = "902B5974-EEBC-4EA2-90E7-5C43A2BABFA8";
}

/// The non-atomic reference-counted handle shell (spec.md Design Notes §9:
/// "reference counting is a thin outer shell"). `add_reference` clones the
/// `Rc` (bumping its non-atomic strong count); `release` is simply letting
/// a clone drop. Both are exposed explicitly so callers used to the
/// original's manual `AddRef`/`Release` pair have a direct equivalent.
pub struct Handle<T>(Rc<RefCell<T>>);

impl<T> Handle<T> {
    pub fn new(value: T) -> Self {
        Handle(Rc::new(RefCell::new(value)))
    }

    pub fn add_reference(&self) -> Handle<T> {
        Handle(Rc::clone(&self.0))
    }

    pub fn release(self) {
        drop(self);
    }

    pub fn reference_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        self.add_reference()
    }
}

/// The database-side façade contract (spec.md §4.6).
pub trait DatabaseFacade {
    fn query_interface(&self, guid: &str) -> Option<Handle<Cursor>>;
    fn name(&self) -> Option<String>;
    fn dialect(&self) -> String;
    fn set(&self, option: &str, value: &str) -> OkMessage;
    fn execute(&self, sql: &str) -> OkMessage;
    /// Runs `sql`, expected to yield exactly one row with one scalar
    /// column, and writes it into `out` (spec.md §4.6 `ask`).
    fn ask(&self, sql: &str, out: &mut Variant) -> OkMessage;
    fn get_cursor(&self) -> Result<Handle<Cursor>>;
    fn get_change_count(&self) -> i64;
    fn get_insert_key(&self) -> i64;
    fn close(&self);
    /// Close plus destroy: for the `Rc`-based shell this is the same as
    /// `close` followed by dropping the last handle.
    fn erase(&self);
}

/// A `Handle<Database>` wired up with its last-executed cursor, so
/// `execute`/`ask`/`get_change_count`/`get_insert_key` have something to
/// operate on without the caller juggling a separate cursor themselves.
pub struct DatabaseHandle {
    database: Handle<Database>,
    scratch: RefCell<Option<Cursor>>,
}

impl DatabaseHandle {
    pub fn open_engine(arguments: ConnectArguments) -> Result<Self> {
        Ok(DatabaseHandle {
            database: Handle::new(Database::open_engine(arguments)?),
            scratch: RefCell::new(None),
        })
    }

    pub fn open_enterprise(connect_string: &str) -> Result<Self> {
        Ok(DatabaseHandle {
            database: Handle::new(Database::open_enterprise(connect_string)?),
            scratch: RefCell::new(None),
        })
    }

    fn with_scratch_cursor<R>(&self, f: impl FnOnce(&mut Cursor) -> Result<R>) -> Result<R> {
        let mut scratch = self.scratch.borrow_mut();
        if scratch.is_none() {
            *scratch = Some(self.database.0.borrow().get_cursor()?);
        }
        f(scratch.as_mut().expect("populated above"))
    }
}

impl DatabaseFacade for DatabaseHandle {
    fn query_interface(&self, guid: &str) -> Option<Handle<Cursor>> {
        if guid != guid::CURSOR {
            return None;
        }
        self.database.0.borrow().get_cursor().ok().map(Handle::new)
    }

    fn name(&self) -> Option<String> {
        self.database.0.borrow().name().map(str::to_owned)
    }

    fn dialect(&self) -> String {
        self.database.0.borrow().dialect().to_owned()
    }

    fn set(&self, option: &str, value: &str) -> OkMessage {
        to_ok_message(self.database.0.borrow_mut().set(option, value))
    }

    fn execute(&self, sql: &str) -> OkMessage {
        to_ok_message(self.with_scratch_cursor(|cursor| {
            cursor.prepare(sql)?;
            cursor.execute()
        }))
    }

    fn ask(&self, sql: &str, out: &mut Variant) -> OkMessage {
        let result = self.with_scratch_cursor(|cursor| {
            cursor.open_sql(sql)?;
            if !cursor.is_valid_row() {
                return Err(Error::state("ask: query returned no rows"));
            }
            let value = cursor.record().variant(0);
            cursor.close();
            Ok(value)
        });
        match result {
            Ok(value) => {
                *out = value;
                (true, String::new())
            }
            Err(e) => to_ok_message::<()>(Err(e)),
        }
    }

    fn get_cursor(&self) -> Result<Handle<Cursor>> {
        Ok(Handle::new(self.database.0.borrow().get_cursor()?))
    }

    fn get_change_count(&self) -> i64 {
        self.scratch.borrow().as_ref().map(Cursor::change_count).unwrap_or(0)
    }

    fn get_insert_key(&self) -> i64 {
        self.scratch.borrow().as_ref().map(Cursor::insert_key).unwrap_or(0)
    }

    fn close(&self) {
        self.database.0.borrow_mut().close();
        *self.scratch.borrow_mut() = None;
    }

    fn erase(&self) {
        self.close();
    }
}

/// The cursor-side façade contract (spec.md §4.6 "cursor-side interface
/// mirrors the state machine").
pub trait CursorFacade {
    fn prepare(&self, sql: &str) -> OkMessage;
    fn prepare_with_params(&self, sql: &str, params: &[VariantView<'_>]) -> OkMessage;
    fn bind(&self, index: usize, value: VariantView<'_>) -> OkMessage;
    /// Binds `params` at consecutive 1-based indices starting at `offset`.
    fn bind_from(&self, offset: usize, params: &[VariantView<'_>]) -> OkMessage;
    fn open(&self) -> OkMessage;
    fn open_sql(&self, sql: &str) -> OkMessage;
    fn next(&self) -> OkMessage;
    fn execute(&self) -> OkMessage;
    /// Snapshots the current row as owned variants, in column order.
    fn get_record(&self) -> Vec<Variant>;
    fn is_open(&self) -> bool;
    fn is_valid_row(&self) -> bool;
    fn close(&self);
}

impl CursorFacade for Handle<Cursor> {
    fn prepare(&self, sql: &str) -> OkMessage {
        to_ok_message(self.0.borrow_mut().prepare(sql))
    }

    fn prepare_with_params(&self, sql: &str, params: &[VariantView<'_>]) -> OkMessage {
        to_ok_message(self.0.borrow_mut().prepare_with_params(sql, params))
    }

    fn bind(&self, index: usize, value: VariantView<'_>) -> OkMessage {
        to_ok_message(self.0.borrow_mut().bind_parameter(index, value))
    }

    fn bind_from(&self, offset: usize, params: &[VariantView<'_>]) -> OkMessage {
        to_ok_message((|| {
            let mut cursor = self.0.borrow_mut();
            for (i, value) in params.iter().enumerate() {
                cursor.bind_parameter(offset + i, *value)?;
            }
            Ok(())
        })())
    }

    fn open(&self) -> OkMessage {
        to_ok_message(self.0.borrow_mut().open())
    }

    fn open_sql(&self, sql: &str) -> OkMessage {
        to_ok_message(self.0.borrow_mut().open_sql(sql))
    }

    fn next(&self) -> OkMessage {
        to_ok_message(self.0.borrow_mut().next())
    }

    fn execute(&self) -> OkMessage {
        to_ok_message(self.0.borrow_mut().execute())
    }

    fn get_record(&self) -> Vec<Variant> {
        self.0.borrow().record().variants()
    }

    fn is_open(&self) -> bool {
        self.0.borrow().is_open()
    }

    fn is_valid_row(&self) -> bool {
        self.0.borrow().is_valid_row()
    }

    fn close(&self) {
        self.0.borrow_mut().close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reference_bumps_strong_count() {
        let handle = Handle::new(Database::open_engine(ConnectArguments::default()).unwrap());
        assert_eq!(handle.reference_count(), 1);
        let other = handle.add_reference();
        assert_eq!(handle.reference_count(), 2);
        other.release();
        assert_eq!(handle.reference_count(), 1);
    }

    #[test]
    fn execute_then_ask_round_trip() {
        let db = DatabaseHandle::open_engine(ConnectArguments::default()).unwrap();
        let (ok, message) = db.execute("CREATE TABLE t(a INTEGER)");
        assert!(ok, "{message}");
        let (ok, _) = db.execute("INSERT INTO t VALUES (1),(2)");
        assert!(ok);
        let mut out = Variant::Unknown;
        let (ok, message) = db.ask("SELECT COUNT(*) FROM t", &mut out);
        assert!(ok, "{message}");
        assert_eq!(out, Variant::Int64(2));
    }

    #[test]
    fn query_interface_rejects_unknown_guid() {
        let db = DatabaseHandle::open_engine(ConnectArguments::default()).unwrap();
        assert!(db.query_interface("not-a-real-guid").is_none());
        assert!(db.query_interface(guid::CURSOR).is_some());
    }
}
