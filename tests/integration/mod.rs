//! Integration tests

pub mod durability_test;
pub mod retention_test;
pub mod sync_engine_test;
