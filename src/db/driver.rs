//! Process-wide network driver registration.
//!
//! `sqlx::any` resolves a connection string's scheme against a driver table
//! that must be installed before the first pool is opened. Installation happens
//! here, explicitly, instead of as a side effect of linking the driver in.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Installs the compiled-in drivers. Safe to call any number of times.
pub fn register() {
    sqlx::any::install_default_drivers();
    if !REGISTERED.swap(true, Ordering::AcqRel) {
        debug!("Installed default sqlx drivers");
    }
}

/// Returns true once [`register`] has run in this process.
pub fn is_registered() -> bool {
    REGISTERED.load(Ordering::Acquire)
}
