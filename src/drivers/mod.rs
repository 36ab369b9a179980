//! Driver bridges: the backend-specific code mapping native calls into the
//! record/cursor model (spec.md §4.4). Two bridges are implemented, one per
//! backend contract described there; [`Cursor`](crate::cursor::Cursor)
//! drives either one through the single [`DriverBridge`] trait, matching
//! the "unify two very different driver contracts under one interface"
//! requirement from spec.md §1.

pub mod engine;
pub mod enterprise;

use crate::error::Result;
use crate::record::Record;
use crate::variant::VariantView;

/// Outcome of advancing a statement by one row (spec.md §4.4 `step`/`next`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Row,
    Done,
}

/// The contract a backend-specific bridge implements. Grounded on the
/// teacher's `Cursor` trait (`odbc-api/src/cursor.rs`): one trait, multiple
/// backends, object-safe so a [`crate::cursor::Cursor`] can hold
/// `Box<dyn DriverBridge>` without knowing which backend it was built for.
pub trait DriverBridge: std::fmt::Debug {
    /// Compiles `sql` into a native statement, discarding any previously
    /// prepared statement.
    fn prepare(&mut self, sql: &str) -> Result<()>;

    /// Binds a 1-based input parameter from a variant-view.
    fn bind_parameter(&mut self, index: usize, value: VariantView<'_>) -> Result<()>;

    /// First advance of a prepared SELECT statement. On the step/pull
    /// backend this is also where column discovery happens
    /// (spec.md §4.4 Variant A).
    fn open(&mut self, record: &mut Record) -> Result<StepOutcome>;

    /// Subsequent advances.
    fn next(&mut self, record: &mut Record) -> Result<StepOutcome>;

    /// Runs a non-SELECT statement to completion.
    fn execute(&mut self) -> Result<()>;

    /// Clears parameter bindings, preserving the compiled statement text.
    fn reset(&mut self) -> Result<()>;

    /// Releases the native statement handle.
    fn finalize(&mut self);

    /// Rows affected by the last `execute` (spec.md §4.6
    /// `get_change_count`).
    fn change_count(&self) -> i64;

    /// Last auto-generated row identifier (spec.md §4.6 `get_insert_key`).
    fn insert_key(&self) -> i64;

    /// A short, driver-identifying string used to populate
    /// [`crate::database::Database::dialect`].
    fn dialect(&self) -> &str;
}
