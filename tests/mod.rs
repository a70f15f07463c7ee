//! Test suite for practice-sync
//!
//! This module organizes all tests

pub mod integration;
pub mod property;
