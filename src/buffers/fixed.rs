//! The fixed-width cell region: one contiguous byte array holding back-to-
//! back fixed-size cells (spec.md §4.2 "Fixed-region primitives").

use crate::types::Kind;
use log::debug;

const GROW_BY: usize = 128;

/// Byte offset of a cell within a [`FixedRegion`].
pub type FixedOffset = u32;

/// Contiguous storage for fixed-width column cells. Grows in 128-byte
/// increments and never shrinks, preserving existing content across growth
/// (matching `gd_database_record.h::buffers::primitive_resize`).
#[derive(Debug, Default)]
pub struct FixedRegion {
    data: Vec<u8>,
}

impl FixedRegion {
    pub fn new() -> Self {
        FixedRegion { data: Vec::new() }
    }

    /// Reserves `size` bytes at the end of the region and returns their
    /// offset. `kind` is accepted for symmetry with the original API and
    /// future diagnostics; it does not affect layout.
    pub fn primitive_add(&mut self, kind: Kind, size: usize) -> FixedOffset {
        let offset = self.data.len() as FixedOffset;
        self.grow_to_hold(self.data.len() + size);
        self.data.resize(self.data.len() + size, 0);
        debug!("allocated fixed cell of {size} bytes for {kind:?} at offset {offset}");
        offset
    }

    /// Grows the cell at `offset` (whose previous size was `old_size`) to
    /// `new_size` bytes, preserving content. A no-op if `new_size` is not
    /// larger than `old_size` (growth never shrinks).
    ///
    /// Only valid when `offset` addresses the most recently added cell:
    /// growing an earlier cell would shift every cell allocated after it.
    /// Record never exercises this for `Fixed` columns (their size is
    /// compile-time constant per spec.md §3); it exists for parity with the
    /// original `primitive_resize` primitive.
    pub fn primitive_resize(&mut self, _kind: Kind, offset: FixedOffset, old_size: usize, new_size: usize) {
        if new_size <= old_size {
            return;
        }
        let offset = offset as usize;
        let grown_by = new_size - old_size;
        self.data.splice(offset + old_size..offset + old_size, vec![0u8; grown_by]);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn data_offset(&self, offset: FixedOffset, len: usize) -> &[u8] {
        let offset = offset as usize;
        &self.data[offset..offset + len]
    }

    pub fn data_offset_mut(&mut self, offset: FixedOffset, len: usize) -> &mut [u8] {
        let offset = offset as usize;
        &mut self.data[offset..offset + len]
    }

    fn grow_to_hold(&mut self, needed: usize) {
        if needed <= self.data.capacity() {
            return;
        }
        let extra = GROW_BY - (self.data.capacity() % GROW_BY);
        let new_capacity = needed.max(self.data.capacity() + extra);
        self.data.reserve(new_capacity - self.data.len());
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_add_returns_back_to_back_offsets() {
        let mut region = FixedRegion::new();
        let a = region.primitive_add(Kind::Int64, 8);
        let b = region.primitive_add(Kind::Float64, 8);
        assert_eq!(a, 0);
        assert_eq!(b, 8);
    }

    #[test]
    fn resize_preserves_content_and_only_grows() {
        let mut region = FixedRegion::new();
        let offset = region.primitive_add(Kind::Int8, 1);
        region.data_offset_mut(offset, 1)[0] = 42;
        region.primitive_resize(Kind::Int8, offset, 1, 1);
        assert_eq!(region.data_offset(offset, 1)[0], 42);
    }
}
