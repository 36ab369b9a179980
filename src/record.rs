//! Ordered column-descriptor table plus owned cell storage for one result
//! row (spec.md §3 "Record", §4.3).

use crate::buffers::{DerivedIndex, FixedOffset, ValueBuffers};
use crate::error::{Error, Result};
use crate::names::{NameArena, NameOffset};
use crate::types::Kind;
use crate::variant::{Variant, VariantView};

/// Bits describing a column's storage and nullness (spec.md §3 "state
/// bitset"). Hand-rolled, matching the teacher's own small FFI-attribute
/// bitmasks rather than the `bitflags` crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnState(u8);

impl ColumnState {
    pub const NULL: ColumnState = ColumnState(0x01);
    pub const FIXED: ColumnState = ColumnState(0x02);
    pub const MEMORY: ColumnState = ColumnState(0x04);
    pub const BLOB: ColumnState = ColumnState(0x08);

    pub const fn empty() -> Self {
        ColumnState(0)
    }

    pub const fn contains(self, other: ColumnState) -> bool {
        self.0 & other.0 == other.0
    }

    fn set(&mut self, set_mask: ColumnState, clear_mask: ColumnState) {
        self.0 |= set_mask.0;
        self.0 &= !clear_mask.0;
    }
}

impl std::ops::BitOr for ColumnState {
    type Output = ColumnState;
    fn bitor(self, rhs: ColumnState) -> ColumnState {
        ColumnState(self.0 | rhs.0)
    }
}

/// Where a column's cell lives: a byte offset in the fixed region, or a
/// slot index in the variable region (spec.md §3 invariant).
#[derive(Clone, Copy, Debug)]
enum ValueLocation {
    Fixed(FixedOffset),
    Variable(DerivedIndex),
}

/// The cell width a driver bridge should request from [`Record::add`] for a
/// `Fixed` column of this kind, per this crate's storage convention: most
/// fixed kinds share one 8-byte cell representation (spec.md §4.3 "Int32:
/// read 8 bytes ... stored as Int64, and narrow", generalized crate-wide),
/// `Bool`/`Bit` use 1 byte, and `Guid` uses 16. Variable kinds return `0`
/// and are allocated as derived buffers instead.
pub const fn fixed_cell_width(kind: Kind) -> usize {
    match kind {
        Kind::Utf8String | Kind::WString | Kind::Utf32String | Kind::Binary => 0,
        Kind::Bool | Kind::Bit => 1,
        Kind::Guid => 16,
        _ => 8,
    }
}

/// Descriptor for a single result-row field (spec.md §3 "Column
/// descriptor").
#[derive(Debug)]
pub struct ColumnDescriptor {
    index: usize,
    kind: Kind,
    c_kind: Kind,
    state: ColumnState,
    /// Value size in bytes, or `-1` as a null sentinel (spec.md §9
    /// supplemented feature #2), matching `gd_database_record.h`'s
    /// `int64_t m_uSize` width — unlike that header's `uint64_t` storage
    /// reinterpreted as signed, this field is declared signed outright so
    /// the sentinel is an ordinary value rather than a same-width bit-cast.
    size: i64,
    buffer_size: u32,
    name_offset: NameOffset,
    alias_offset: Option<NameOffset>,
    location: ValueLocation,
}

impl ColumnDescriptor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The storage representation hint passed to the driver bridge
    /// (spec.md §3: "c-kind (the storage representation hint for the
    /// bridge)"). Usually equal to `kind`, but bridges may request a wider
    /// or narrower native representation (e.g. reading a 32 bit integer
    /// column through a 64 bit `c_kind`).
    pub fn c_kind(&self) -> Kind {
        self.c_kind
    }

    pub fn is_null(&self) -> bool {
        // spec.md §9 supplemented feature #2: a recorded size of -1 also
        // means null, independent of the state bitset, matching the
        // original `column::is_null()`. `set_null` writes both, so the two
        // conditions usually agree; the size check alone is what a bridge
        // reading a raw indicator value (rather than the state bitset)
        // would use.
        self.state.contains(ColumnState::NULL) || self.size == -1
    }

    pub fn is_fixed(&self) -> bool {
        self.state.contains(ColumnState::FIXED)
    }

    pub fn is_blob(&self) -> bool {
        self.state.contains(ColumnState::BLOB)
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn name<'a>(&self, names: &'a NameArena) -> &'a str {
        names.get(self.name_offset)
    }

    pub fn alias<'a>(&self, names: &'a NameArena) -> Option<&'a str> {
        self.alias_offset.map(|offset| names.get(offset))
    }
}

/// Column table + name arena + value buffers for one result row (spec.md
/// §3 "Record").
#[derive(Debug, Default)]
pub struct Record {
    columns: Vec<ColumnDescriptor>,
    names: NameArena,
    buffers: ValueBuffers,
}

impl Record {
    pub fn new() -> Self {
        Record {
            columns: Vec::new(),
            names: NameArena::new(),
            buffers: ValueBuffers::new(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    pub fn get_column(&self, index: usize) -> &ColumnDescriptor {
        &self.columns[index]
    }

    /// Appends a column (spec.md §4.3 `add`). `size_fixed = 0` allocates a
    /// variable (derived) cell instead of a fixed one; `start_buffer_size`
    /// is the derived buffer's initial payload capacity (floored at 128
    /// bytes by [`crate::buffers::VariableRegion::derived_add`]).
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        kind: Kind,
        c_kind: Option<Kind>,
        size_fixed: usize,
        start_buffer_size: Option<usize>,
        name: &str,
        alias: Option<&str>,
        state: Option<ColumnState>,
    ) -> Result<&mut Record> {
        let index = self.columns.len();
        let mut state = state.unwrap_or(ColumnState::empty());

        let (location, buffer_size) = if size_fixed > 0 {
            state.set(ColumnState::FIXED, ColumnState::empty());
            let offset = self.buffers.fixed.primitive_add(kind, size_fixed);
            (ValueLocation::Fixed(offset), size_fixed as u32)
        } else {
            state.set(ColumnState::empty(), ColumnState::FIXED);
            let initial = start_buffer_size.unwrap_or(0).max(128);
            let slot = self.buffers.variable.derived_add(kind, initial);
            let capacity = self.buffers.variable.derived_data_value(slot).len() as u32;
            (ValueLocation::Variable(slot), capacity)
        };

        let name_offset = self.names.add(name)?;
        let alias_offset = match alias {
            Some(a) => Some(self.names.add(a)?),
            None => None,
        };

        self.columns.push(ColumnDescriptor {
            index,
            kind,
            c_kind: c_kind.unwrap_or(kind),
            state,
            size: 0,
            buffer_size,
            name_offset,
            alias_offset,
            location,
        });
        Ok(self)
    }

    /// Pointer-equivalent read access to a column's cell (spec.md §4.3
    /// `buffer_get`).
    pub fn buffer_get(&self, index: usize) -> &[u8] {
        let column = &self.columns[index];
        match column.location {
            ValueLocation::Fixed(offset) => {
                self.buffers.fixed.data_offset(offset, column.buffer_size as usize)
            }
            ValueLocation::Variable(slot) => self.buffers.variable.derived_data_value(slot),
        }
    }

    fn buffer_get_mut(&mut self, index: usize) -> &mut [u8] {
        let column = &self.columns[index];
        match column.location {
            ValueLocation::Fixed(offset) => {
                let len = column.buffer_size as usize;
                self.buffers.fixed.data_offset_mut(offset, len)
            }
            ValueLocation::Variable(slot) => self.buffers.variable.derived_data_value_mut(slot),
        }
    }

    /// Grows the variable buffer backing column `index` to at least `size`
    /// bytes of payload (spec.md §4.3 `resize`). A no-op for `Fixed`
    /// columns and for sizes not exceeding the current capacity. Any
    /// previously obtained `buffer_get` slice for this column is
    /// invalidated.
    pub fn resize(&mut self, index: usize, size: usize) {
        let column = &self.columns[index];
        if let ValueLocation::Variable(slot) = column.location {
            self.buffers.variable.derived_resize(slot, size);
            let new_capacity = self.buffers.variable.derived_data_value(slot).len() as u32;
            self.columns[index].buffer_size = new_capacity;
        }
    }

    /// Linear scan by column name. Returns `None` on a miss (spec.md §7
    /// `NotFound` is a non-error, encoded here as `Option::None` rather than
    /// the original's sentinel index `-1`). Ties are broken by first match.
    pub fn column_index_by_name(&self, name: &str) -> Option<usize> {
        self.columns.iter().find(|c| c.name(&self.names) == name).map(|c| c.index)
    }

    /// As [`Self::column_index_by_name`], but over column aliases
    /// (spec.md §9 supplemented feature #1).
    pub fn column_index_by_alias(&self, alias: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|c| c.alias(&self.names) == Some(alias))
            .map(|c| c.index)
    }

    pub fn set_column_state(&mut self, index: usize, set_mask: ColumnState, clear_mask: ColumnState) {
        self.columns[index].state.set(set_mask, clear_mask);
    }

    pub fn set_null(&mut self, index: usize, is_null: bool) {
        if is_null {
            self.columns[index].state.set(ColumnState::NULL, ColumnState::empty());
            self.columns[index].size = -1;
        } else {
            self.columns[index].state.set(ColumnState::empty(), ColumnState::NULL);
        }
    }

    /// Writes an 8-byte native value into a `Fixed` cell (spec.md §4.4
    /// row-fill: "If column is Fixed -> copy 8 bytes (Int64/Float64) into
    /// the cell"). All integer-family and date/time kinds share this 8-byte
    /// cell representation in this crate (`Int32`'s "stored as Int64, then
    /// narrowed" rule from spec.md §4.3 generalizes to every sub-64-bit
    /// integer kind). Panics if the column was not allocated with an 8-byte
    /// fixed cell.
    pub fn write_fixed_i64(&mut self, index: usize, value: i64) {
        self.buffer_get_mut(index)[..8].copy_from_slice(&value.to_ne_bytes());
        self.columns[index].size = 8;
        self.set_null(index, false);
    }

    pub fn write_fixed_f64(&mut self, index: usize, value: f64) {
        self.buffer_get_mut(index)[..8].copy_from_slice(&value.to_ne_bytes());
        self.columns[index].size = 8;
        self.set_null(index, false);
    }

    /// Writes a 1-byte `Bool`/`Bit` cell.
    pub fn write_fixed_bool(&mut self, index: usize, value: bool) {
        self.buffer_get_mut(index)[0] = value as u8;
        self.columns[index].size = 1;
        self.set_null(index, false);
    }

    /// Writes a 16-byte `Guid` cell.
    pub fn write_fixed_guid(&mut self, index: usize, value: [u8; 16]) {
        self.buffer_get_mut(index)[..16].copy_from_slice(&value);
        self.columns[index].size = 16;
        self.set_null(index, false);
    }

    /// Writes a variable-width payload, growing the backing buffer first if
    /// needed (spec.md §4.4 row-fill). `append_nul` appends a trailing NUL
    /// after the payload without counting it in the reported length
    /// (string kinds); binary kinds pass `false`.
    pub fn write_variable(&mut self, index: usize, bytes: &[u8], append_nul: bool) {
        let needed = bytes.len() + if append_nul { 1 } else { 0 };
        let current_capacity = self.columns[index].buffer_size as usize;
        if needed > current_capacity {
            self.resize(index, needed);
        }
        let slot = match self.columns[index].location {
            ValueLocation::Variable(slot) => slot,
            ValueLocation::Fixed(_) => panic!("write_variable called on a fixed column"),
        };
        self.buffers.variable.derived_data_value_mut(slot)[..bytes.len()].copy_from_slice(bytes);
        if append_nul {
            self.buffers.variable.derived_data_value_mut(slot)[bytes.len()] = 0;
        }
        self.buffers.variable.set_value_size(slot, bytes.len() as u32);
        self.columns[index].size = bytes.len() as i64;
        self.set_null(index, false);
    }

    fn read_raw(&self, index: usize) -> VariantView<'_> {
        let column = &self.columns[index];
        if column.is_null() {
            return VariantView::Unknown;
        }
        match column.kind {
            Kind::Utf8String | Kind::WString | Kind::Utf32String => {
                let bytes = self.buffer_get(index);
                let len = column.size as usize;
                let text = std::str::from_utf8(&bytes[..len]).unwrap_or("");
                VariantView::Utf8String(text)
            }
            Kind::Binary => {
                let bytes = self.buffer_get(index);
                let len = column.size as usize;
                VariantView::Binary(&bytes[..len])
            }
            Kind::Guid => {
                let bytes = self.buffer_get(index);
                VariantView::Guid(bytes[..16].try_into().unwrap())
            }
            Kind::Bool | Kind::Bit => {
                let bytes = self.buffer_get(index);
                VariantView::Bool(bytes[0] != 0)
            }
            Kind::Float32 | Kind::Float64 | Kind::Decimal | Kind::Numeric => {
                let bytes = self.buffer_get(index);
                VariantView::Float64(f64::from_ne_bytes(bytes[..8].try_into().unwrap()))
            }
            // Int32 and every other integer/date-time kind share the 8-byte
            // cell representation (spec.md §4.3 "Int32: ... stored as
            // Int64, and narrow", generalized to the rest of the integer
            // family in this crate).
            _ => {
                let bytes = self.buffer_get(index);
                VariantView::Int64(i64::from_ne_bytes(bytes[..8].try_into().unwrap()))
            }
        }
    }

    /// Narrowing `Int32` read: the cell is stored as an 8-byte `Int64`
    /// (spec.md §4.3 "Int32: read 8 bytes ... and narrow") and truncated to
    /// the 32 bit range here so downstream `as i32` casts are lossless.
    pub fn variant_view(&self, index: usize) -> VariantView<'_> {
        let view = self.read_raw(index);
        if self.columns[index].kind == Kind::Int32 {
            if let VariantView::Int64(v) = view {
                return VariantView::Int64(v as i32 as i64);
            }
        }
        view
    }

    pub fn variant_view_by_name(&self, name: &str) -> VariantView<'_> {
        match self.column_index_by_name(name) {
            Some(index) => self.variant_view(index),
            None => VariantView::Unknown,
        }
    }

    pub fn variant(&self, index: usize) -> Variant {
        self.variant_view(index).to_owned_variant()
    }

    pub fn variants(&self) -> Vec<Variant> {
        (0..self.column_count()).map(|i| self.variant(i)).collect()
    }

    pub fn variant_views(&self) -> Vec<VariantView<'_>> {
        (0..self.column_count()).map(|i| self.variant_view(i)).collect()
    }

    pub fn variant_views_selected(&self, indices: &[usize]) -> Vec<VariantView<'_>> {
        indices.iter().map(|&i| self.variant_view(i)).collect()
    }

    /// Materializes `{name -> variant-view}` pairs, preserving column order
    /// (spec.md §4.3 `arguments`).
    pub fn arguments(&self) -> Vec<(&str, VariantView<'_>)> {
        self.columns
            .iter()
            .map(|c| (c.name(&self.names), self.variant_view(c.index)))
            .collect()
    }

    /// Resets all owned storage: column table, name arena, and both buffer
    /// regions.
    pub fn clear(&mut self) {
        self.columns.clear();
        self.names.clear();
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_lookup_by_name() {
        let mut record = Record::new();
        record.add(Kind::Int64, None, 8, None, "id", None, None).unwrap();
        assert_eq!(record.column_index_by_name("id"), Some(0));
        assert_eq!(record.get_column(0).kind(), Kind::Int64);
    }

    #[test]
    fn lookup_miss_is_none_not_error() {
        let record = Record::new();
        assert_eq!(record.column_index_by_name("nope"), None);
        assert_eq!(record.variant_view_by_name("nope"), VariantView::Unknown);
    }

    #[test]
    fn fixed_roundtrip_int64() {
        let mut record = Record::new();
        record.add(Kind::Int64, None, 8, None, "a", None, None).unwrap();
        record.write_fixed_i64(0, 42);
        assert_eq!(record.variant_view(0), VariantView::Int64(42));
    }

    #[test]
    fn variable_roundtrip_string_excludes_nul_from_length() {
        let mut record = Record::new();
        record.add(Kind::Utf8String, None, 0, Some(32), "name", None, None).unwrap();
        record.write_variable(0, b"hello", true);
        let view = record.variant_view(0);
        assert_eq!(view.length(), 5);
        assert_eq!(view, VariantView::Utf8String("hello"));
    }

    #[test]
    fn blob_growth_on_oversized_write() {
        let mut record = Record::new();
        record.add(Kind::Utf8String, None, 0, Some(32), "text", None, None).unwrap();
        assert_eq!(record.get_column(0).buffer_size(), 128); // floored at 128
        let big = vec![b'x'; 1000];
        record.write_variable(0, &big, true);
        assert!(record.get_column(0).buffer_size() as usize >= 1001);
        assert_eq!(record.variant_view(0).length(), 1000);
    }

    #[test]
    fn null_column_yields_unknown_view() {
        let mut record = Record::new();
        record.add(Kind::Int64, None, 8, None, "n", None, None).unwrap();
        record.set_null(0, true);
        assert_eq!(record.variant_view(0), VariantView::Unknown);
    }

    #[test]
    fn is_null_follows_the_size_sentinel_even_without_the_state_bit() {
        let mut record = Record::new();
        record.add(Kind::Int64, None, 8, None, "n", None, None).unwrap();
        record.set_null(0, true);
        assert_eq!(record.get_column(0).size(), -1);
        record.set_column_state(0, ColumnState::empty(), ColumnState::NULL);
        assert!(record.get_column(0).is_null());
    }

    #[test]
    fn alias_lookup() {
        let mut record = Record::new();
        record
            .add(Kind::Int64, None, 8, None, "a", Some("alias_a"), None)
            .unwrap();
        assert_eq!(record.column_index_by_alias("alias_a"), Some(0));
    }

    #[test]
    fn clear_resets_everything() {
        let mut record = Record::new();
        record.add(Kind::Int64, None, 8, None, "a", None, None).unwrap();
        record.clear();
        assert_eq!(record.column_count(), 0);
        assert_eq!(record.column_index_by_name("a"), None);
    }
}
