//! Append-only buffer of length-prefixed strings (spec.md §4.1).
//!
//! Layout: consecutive `[u16 length][utf8 bytes][nul]` records. `add`
//! returns the offset of the first byte *after* the length prefix, matching
//! `gd_database_record.h::names::add`.

use crate::error::{Error, Result};

const GROW_BY: usize = 256;

/// Offset into a [`NameArena`], pointing at the first byte of a name's UTF-8
/// payload (i.e. just past its length prefix).
pub type NameOffset = u32;

/// An append-only arena of column/alias names. Names are never freed
/// individually; the whole arena is reclaimed by [`NameArena::clear`] or
/// drop.
#[derive(Debug, Default)]
pub struct NameArena {
    buffer: Vec<u8>,
}

impl NameArena {
    pub fn new() -> Self {
        NameArena { buffer: Vec::new() }
    }

    /// Appends `name` to the arena and returns the offset of its payload.
    /// Offsets are monotonically non-decreasing across calls on the same
    /// arena. Names are assumed to be shorter than 1000 bytes.
    pub fn add(&mut self, name: &str) -> Result<NameOffset> {
        debug_assert!(name.len() < 1000, "name longer than assumed maximum");
        let len: u16 = name
            .len()
            .try_into()
            .map_err(|_| Error::OutOfMemory { what: "name arena" })?;

        let needed = self.buffer.len() + 2 + name.len() + 1;
        self.reserve(needed)?;

        let payload_offset = self.buffer.len() as NameOffset + 2;
        self.buffer.extend_from_slice(&len.to_le_bytes());
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.push(0);
        Ok(payload_offset)
    }

    /// Returns the string stored at `offset`, as previously returned by
    /// [`NameArena::add`].
    pub fn get(&self, offset: NameOffset) -> &str {
        let offset = offset as usize;
        let len = u16::from_le_bytes([self.buffer[offset - 2], self.buffer[offset - 1]]) as usize;
        std::str::from_utf8(&self.buffer[offset..offset + len])
            .expect("name arena only ever stores valid utf8")
    }

    /// Releases all storage. Previously returned offsets become invalid.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn reserve(&mut self, needed: usize) -> Result<()> {
        if needed <= self.buffer.capacity() {
            return Ok(());
        }
        let grow_by = GROW_BY;
        let extra = grow_by - (self.buffer.capacity() % grow_by);
        let new_capacity = (needed).max(self.buffer.capacity() + extra);
        self.buffer.reserve(new_capacity - self.buffer.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_get_round_trips() {
        let mut arena = NameArena::new();
        let offset = arena.add("id").unwrap();
        assert_eq!(arena.get(offset), "id");
    }

    #[test]
    fn offsets_increase_monotonically() {
        let mut arena = NameArena::new();
        let a = arena.add("a").unwrap();
        let b = arena.add("bb").unwrap();
        let c = arena.add("ccc").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert_eq!(arena.get(a), "a");
        assert_eq!(arena.get(b), "bb");
        assert_eq!(arena.get(c), "ccc");
    }

    #[test]
    fn clear_resets_buffer() {
        let mut arena = NameArena::new();
        arena.add("x").unwrap();
        arena.clear();
        assert_eq!(arena.add("y").unwrap(), 2);
    }
}
