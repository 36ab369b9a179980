//! A small, typed row/column access layer unifying an embedded SQL engine
//! and an ODBC connection behind one cursor API.
//!
//! Two backends, one model: [`drivers::engine`] drives an in-process
//! `rusqlite` connection, [`drivers::enterprise`] drives a raw ODBC 3
//! connection via `odbc-sys`. Both fill the same [`record::Record`] shape
//! so callers never branch on which backend they're talking to.
//!
//! [`facade`] is the outermost, reference-counted handle layer; most of the
//! crate (`database`, `cursor`, `record`, `variant`, `types`) is usable
//! directly for callers who don't need that shell.

pub mod buffers;
pub mod connection_string;
pub mod cursor;
pub mod database;
pub mod drivers;
pub mod error;
pub mod facade;
pub mod names;
pub mod record;
pub mod types;
pub mod variant;

pub use cursor::Cursor;
pub use database::{ConnectArguments, Database};
pub use error::{Error, OkMessage, Result};
pub use facade::{CursorFacade, DatabaseFacade, DatabaseHandle, Handle};
pub use record::Record;
pub use types::Kind;
pub use variant::{Variant, VariantView};
