//! In-memory stores and fixtures for exercising runs without a database.
//!
//! [`memory_source::MemorySource`], [`memory_target::MemoryTarget`] and
//! [`memory_cache::MemoryCache`] implement the store seams over plain collections and can be
//! told to fail specific operations. [`fixtures`] builds well-typed rows for every table.

pub mod fixtures;
pub mod memory_cache;
pub mod memory_source;
pub mod memory_target;
