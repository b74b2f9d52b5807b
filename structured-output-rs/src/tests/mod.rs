//! Unit tests for the structured output crate
//!
//! This module contains tests that exercise several components together.

pub mod openai_compat_mock_tests;
