//! Seams between the load engine and its backing stores.
//!
//! [`SourceStore`] reads the operational database and [`TargetStore`] reads and writes the
//! warehouse, including its watermark log. Postgres implementations live in [`postgres`];
//! in-memory doubles for tests live in `test_utils`.

pub mod postgres;
mod source;
mod target;

pub use source::*;
pub use target::*;
