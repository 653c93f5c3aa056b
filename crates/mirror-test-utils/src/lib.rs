//! Shared test utilities for the hardlink-mirror workspace.
//!
//! This crate provides standardised test fixtures to eliminate duplication
//! across crate test suites. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`fixture`]: [`MirrorFixture`] temporary tree with member folders
//! - [`wait_until`]: polling helper for watcher tests

pub mod fixture;

pub use fixture::MirrorFixture;

use std::time::{Duration, Instant};

/// Poll `condition` every 20ms until it holds or `timeout` elapses.
/// Returns whether it held.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
