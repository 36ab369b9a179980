//! The cursor state machine (spec.md §4.5): prepares SQL, binds input
//! parameters and output buffers, steps through rows, and refills the
//! record from native storage, driving one [`DriverBridge`] at a time.

use crate::drivers::{DriverBridge, StepOutcome};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::variant::VariantView;

/// Lifecycle phase of a [`Cursor`] (spec.md §4.5 "States").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Unprepared,
    Prepared,
    Open,
    Closed,
}

/// Orthogonal status bits layered on top of [`Phase`] (spec.md §3 Cursor
/// "state bitset (Row, Memory)").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorFlags(u8);

impl CursorFlags {
    /// The cursor is positioned on a valid row.
    pub const ROW: CursorFlags = CursorFlags(0x01);
    /// The result set is held entirely in the driver's in-memory buffers
    /// (e.g. the embedded engine's `:memory:` database, or a fully
    /// materialized ODBC row set) rather than streamed.
    pub const MEMORY: CursorFlags = CursorFlags(0x02);

    const fn empty() -> Self {
        CursorFlags(0)
    }

    pub const fn contains(self, other: CursorFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn set(&mut self, set_mask: CursorFlags, clear_mask: CursorFlags) {
        self.0 |= set_mask.0;
        self.0 &= !clear_mask.0;
    }
}

/// Drives one result set at a time against a native statement handle
/// (spec.md §3 "Cursor", §4.5). Non-copyable: the source's copy/move
/// constructors were empty placeholders (spec.md Design Notes §9), so this
/// type derives neither `Copy` nor `Clone` and its statement handle moves
/// only via ordinary Rust move semantics of the owning `Cursor` value.
#[derive(Debug)]
pub struct Cursor {
    record: Record,
    bridge: Box<dyn DriverBridge>,
    phase: Phase,
    flags: CursorFlags,
}

impl Cursor {
    /// Constructs a cursor attached to a database via its bridge. No
    /// columns yet: the record starts empty.
    pub fn new(bridge: Box<dyn DriverBridge>) -> Self {
        Cursor {
            record: Record::new(),
            bridge,
            phase: Phase::Unprepared,
            flags: CursorFlags::empty(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    pub fn is_valid_row(&self) -> bool {
        self.phase == Phase::Open && self.flags.contains(CursorFlags::ROW)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Compiles `sql` into a statement. Allocates the statement and empties
    /// the record (spec.md §4.5 transition table).
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.bridge.prepare(sql)?;
        self.record.clear();
        self.phase = Phase::Prepared;
        self.flags = CursorFlags::empty();
        Ok(())
    }

    /// Binds a 1-based input parameter. Valid only in `Prepared` state.
    pub fn bind_parameter(&mut self, index: usize, value: VariantView<'_>) -> Result<()> {
        self.require_phase(Phase::Prepared, "bind_parameter")?;
        self.bridge.bind_parameter(index, value)
    }

    /// Convenience: prepares `sql` then binds every parameter in order.
    pub fn prepare_with_params(&mut self, sql: &str, params: &[VariantView<'_>]) -> Result<()> {
        self.prepare(sql)?;
        for (i, value) in params.iter().enumerate() {
            self.bind_parameter(i + 1, *value)?;
        }
        Ok(())
    }

    /// Opens the prepared statement as a result set: first `step`, plus
    /// column discovery on the step/pull backend (spec.md §4.5 `open`).
    pub fn open(&mut self) -> Result<()> {
        self.require_phase(Phase::Prepared, "open")?;
        let outcome = self.bridge.open(&mut self.record)?;
        self.phase = Phase::Open;
        self.flags.set(
            if outcome == StepOutcome::Row { CursorFlags::ROW } else { CursorFlags::empty() },
            CursorFlags::ROW,
        );
        Ok(())
    }

    /// `prepare` then `open` in one call.
    pub fn open_sql(&mut self, sql: &str) -> Result<()> {
        self.prepare(sql)?;
        self.open()
    }

    /// Advances to the next row of an open result set.
    pub fn next(&mut self) -> Result<()> {
        self.require_phase(Phase::Open, "next")?;
        let outcome = self.bridge.next(&mut self.record)?;
        self.flags.set(
            if outcome == StepOutcome::Row { CursorFlags::ROW } else { CursorFlags::empty() },
            CursorFlags::ROW,
        );
        Ok(())
    }

    /// Runs a non-SELECT statement to completion, returning the cursor to
    /// `Prepared` with bindings cleared (spec.md §4.5 `execute`).
    pub fn execute(&mut self) -> Result<()> {
        match self.phase {
            Phase::Prepared | Phase::Open => {}
            _ => return Err(Error::state(format!("execute called in {:?} state", self.phase))),
        }
        self.bridge.execute()?;
        self.bridge.reset()?;
        self.phase = Phase::Prepared;
        self.flags = CursorFlags::empty();
        Ok(())
    }

    pub fn change_count(&self) -> i64 {
        self.bridge.change_count()
    }

    pub fn insert_key(&self) -> i64 {
        self.bridge.insert_key()
    }

    pub fn dialect(&self) -> &str {
        self.bridge.dialect()
    }

    /// Releases the statement and clears the record. Valid from any phase;
    /// idempotent.
    pub fn close(&mut self) {
        self.bridge.finalize();
        self.record.clear();
        self.phase = Phase::Closed;
        self.flags = CursorFlags::empty();
    }

    fn require_phase(&self, expected: Phase, op: &'static str) -> Result<()> {
        if self.phase != expected {
            return Err(Error::state(format!(
                "{op} requires {expected:?} state, cursor is {:?}",
                self.phase
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::engine::EngineBridge;

    fn memory_cursor() -> Cursor {
        let bridge = EngineBridge::open_in_memory().unwrap();
        Cursor::new(Box::new(bridge))
    }

    #[test]
    fn round_trip_select_literal() {
        let mut cursor = memory_cursor();
        cursor.open_sql("SELECT 1").unwrap();
        assert!(cursor.is_valid_row());
        assert_eq!(cursor.record().variant_view(0), crate::variant::VariantView::Int64(1));
        cursor.next().unwrap();
        assert!(!cursor.is_valid_row());
        cursor.close();
    }

    #[test]
    fn bind_parameter_before_prepare_is_state_error() {
        let mut cursor = memory_cursor();
        let err = cursor.bind_parameter(1, VariantView::Int64(1)).unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }
}
