//! Shared utilities.

#[cfg(all(unix, any(test, feature = "testutil")))]
pub mod testutil;
