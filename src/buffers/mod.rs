//! Two-region value storage for a [`crate::record::Record`] (spec.md §3
//! "Value buffers"): a contiguous fixed region for fixed-width cells, and a
//! vector of independently owned variable-sized buffers.

mod fixed;
mod variable;

pub use fixed::{FixedOffset, FixedRegion};
pub use variable::{DerivedIndex, VariableRegion};

/// The pair of storage regions a [`crate::record::Record`] owns.
#[derive(Debug, Default)]
pub struct ValueBuffers {
    pub fixed: FixedRegion,
    pub variable: VariableRegion,
}

impl ValueBuffers {
    pub fn new() -> Self {
        ValueBuffers {
            fixed: FixedRegion::new(),
            variable: VariableRegion::new(),
        }
    }

    pub fn clear(&mut self) {
        self.fixed.clear();
        self.variable.clear();
    }
}
