//! The variable-width region: an ordered list of independently owned
//! buffers, one per variable-width column (spec.md §4.2 "Variable region").
//!
//! Each buffer is laid out as `[u32 size][u32 kind][payload...]`, where
//! `size` is the size of the payload and `kind` is the value's type code.
//! Payload starts at byte offset 8, so a buffer's backing allocation must be
//! 8-byte aligned for `Int64`/`Float64` loads through the payload to be
//! well-defined (spec.md Design Notes §9).

use crate::types::Kind;
use log::debug;

const HEADER_LEN: usize = 8;
const MIN_PAYLOAD: usize = 128;

/// Index of a buffer within a [`VariableRegion`].
pub type DerivedIndex = usize;

/// One owned, 8-byte-aligned, length/kind-prefixed buffer.
#[derive(Debug)]
struct DerivedBuffer {
    // Boxed `u64` slice guarantees 8-byte alignment for the header and
    // payload even though the logical content is bytes.
    storage: Box<[u64]>,
    // Logical length in bytes of `storage`, which may be less than
    // `storage.len() * 8` due to rounding up to whole u64 words.
    byte_len: usize,
}

impl DerivedBuffer {
    fn with_payload_capacity(kind: Kind, payload_size: usize) -> Self {
        let byte_len = HEADER_LEN + payload_size;
        let words = byte_len.div_ceil(8);
        let mut storage = vec![0u64; words].into_boxed_slice();
        write_header(&mut storage, payload_size as u32, kind);
        DerivedBuffer { storage, byte_len }
    }

    fn as_bytes(&self) -> &[u8] {
        let ptr = self.storage.as_ptr() as *const u8;
        unsafe { std::slice::from_raw_parts(ptr, self.byte_len) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        let ptr = self.storage.as_mut_ptr() as *mut u8;
        unsafe { std::slice::from_raw_parts_mut(ptr, self.byte_len) }
    }
}

fn write_header(storage: &mut [u64], size: u32, kind: Kind) {
    let bytes = unsafe {
        std::slice::from_raw_parts_mut(storage.as_mut_ptr() as *mut u8, HEADER_LEN)
    };
    bytes[0..4].copy_from_slice(&size.to_le_bytes());
    bytes[4..8].copy_from_slice(&(kind as u32).to_le_bytes());
}

/// Ordered collection of owned variable-sized buffers, one per variable
/// column.
#[derive(Debug, Default)]
pub struct VariableRegion {
    buffers: Vec<DerivedBuffer>,
}

impl VariableRegion {
    pub fn new() -> Self {
        VariableRegion { buffers: Vec::new() }
    }

    /// Allocates a new derived buffer of at least `initial_size` payload
    /// bytes (minimum 128) and returns its slot index.
    pub fn derived_add(&mut self, kind: Kind, initial_size: usize) -> DerivedIndex {
        let payload = initial_size.max(MIN_PAYLOAD);
        let buffer = DerivedBuffer::with_payload_capacity(kind, payload);
        self.buffers.push(buffer);
        self.buffers.len() - 1
    }

    /// Pointer-equivalent: the whole buffer including its 8-byte header.
    pub fn derived_data(&self, index: DerivedIndex) -> &[u8] {
        self.buffers[index].as_bytes()
    }

    /// The payload region only, i.e. `derived_data(index)[8..]`.
    pub fn derived_data_value(&self, index: DerivedIndex) -> &[u8] {
        &self.buffers[index].as_bytes()[HEADER_LEN..]
    }

    pub fn derived_data_value_mut(&mut self, index: DerivedIndex) -> &mut [u8] {
        let len = self.buffers[index].byte_len;
        &mut self.buffers[index].as_bytes_mut()[HEADER_LEN..len]
    }

    /// Current payload size recorded in the buffer's header.
    pub fn payload_size(&self, index: DerivedIndex) -> u32 {
        let bytes = self.derived_data(index);
        u32::from_le_bytes(bytes[0..4].try_into().unwrap())
    }

    /// Kind recorded in the buffer's header.
    pub fn kind(&self, index: DerivedIndex) -> u32 {
        let bytes = self.derived_data(index);
        u32::from_le_bytes(bytes[4..8].try_into().unwrap())
    }

    /// Grows the buffer at `index` so its payload can hold at least
    /// `new_size` bytes, if it cannot already. Allocates a new buffer,
    /// copies the header and payload forward, and updates the size header.
    /// A no-op (shrinking is never performed) if `new_size` does not exceed
    /// the current payload capacity.
    pub fn derived_resize(&mut self, index: DerivedIndex, new_size: usize) {
        let current_capacity = self.buffers[index].byte_len - HEADER_LEN;
        if new_size <= current_capacity {
            return;
        }
        debug!(
            "resizing derived buffer {index}: payload {current_capacity} => {new_size} bytes"
        );
        let kind = kind_from_code(self.kind(index));
        let mut new_buffer = DerivedBuffer::with_payload_capacity(kind, new_size);
        let copy_len = current_capacity.min(new_size);
        new_buffer.as_bytes_mut()[HEADER_LEN..HEADER_LEN + copy_len]
            .copy_from_slice(&self.buffers[index].as_bytes()[HEADER_LEN..HEADER_LEN + copy_len]);
        // `with_payload_capacity` already wrote the header as `(size=new_size,
        // kind)`; callers that track a logical value size smaller than
        // capacity (e.g. `Record::write_variable`) call `set_value_size`
        // right after resizing to record it.
        self.buffers[index] = new_buffer;
    }

    /// Updates the size recorded in the buffer's header without
    /// reallocating (the caller has already verified the new size fits in
    /// the current capacity, growing first with [`Self::derived_resize`]
    /// otherwise).
    pub fn set_value_size(&mut self, index: DerivedIndex, size: u32) {
        let kind = self.kind(index);
        let bytes = self.buffers[index].as_bytes_mut();
        bytes[0..4].copy_from_slice(&size.to_le_bytes());
        let _ = kind;
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

fn kind_from_code(code: u32) -> Kind {
    crate::types::kind_from_code(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_add_allocates_at_least_min_payload() {
        let mut region = VariableRegion::new();
        let index = region.derived_add(Kind::Utf8String, 10);
        assert_eq!(region.derived_data_value(index).len(), 128);
    }

    #[test]
    fn header_round_trips_size_and_kind() {
        let mut region = VariableRegion::new();
        let index = region.derived_add(Kind::Binary, 200);
        assert_eq!(region.payload_size(index), 200);
        assert_eq!(kind_from_code(region.kind(index)), Kind::Binary);
    }

    #[test]
    fn resize_grows_and_preserves_payload() {
        let mut region = VariableRegion::new();
        let index = region.derived_add(Kind::Utf8String, 32);
        region.derived_data_value_mut(index)[0..5].copy_from_slice(b"hello");
        region.set_value_size(index, 5);
        region.derived_resize(index, 1001);
        assert!(region.derived_data_value(index).len() >= 1001);
        assert_eq!(&region.derived_data_value(index)[0..5], b"hello");
        // header tracks the new capacity, kind unchanged, until a caller
        // records a smaller logical value size via `set_value_size`.
        assert_eq!(region.payload_size(index), 1001);
        assert_eq!(kind_from_code(region.kind(index)), Kind::Utf8String);
    }

    #[test]
    fn shrinking_is_a_no_op() {
        let mut region = VariableRegion::new();
        let index = region.derived_add(Kind::Utf8String, 256);
        region.derived_resize(index, 10);
        assert_eq!(region.derived_data_value(index).len(), 256);
    }
}
