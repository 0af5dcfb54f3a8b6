//! Static description of the warehouse tables and the source queries that feed them.
//!
//! The catalog is built at compile time and passed around by `&'static` reference; nothing in it
//! is mutated after startup.

mod extracts;
mod schema;
mod tables;

pub use extracts::*;
pub use schema::*;
pub use tables::*;
