//! Row model shared by the source and target stores.
//!
//! Rows travel between stores as ordered [`Cell`] vectors described by the table catalog.

mod cell;
mod table_row;
mod touched;

pub use cell::*;
pub use table_row::*;
pub use touched::*;
