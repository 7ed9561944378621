//! Worker pool and run coordinator tests.
