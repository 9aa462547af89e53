//! Snapshot records shared between sensor tasks and consumers
//!
//! Writers replace a whole record under one write lock; readers copy the
//! whole record out. A reader therefore never observes a half-updated fix.

use crate::core::{AcousticReading, DepthReading, FilteredTargetFix, GnssFix, RawTargetFix};
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable handle to one shared record
#[derive(Debug, Default)]
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Arc::clone(&self.0))
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared(Arc::new(RwLock::new(value)))
    }

    /// Replace the record
    pub fn publish(&self, value: T) {
        *self.0.write() = value;
    }

    /// Modify the record in place under the write lock
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.write())
    }

    /// Read part of the record without copying all of it
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.read())
    }
}

impl<T: Clone> Shared<T> {
    /// Copy of the whole record
    pub fn snapshot(&self) -> T {
        self.0.read().clone()
    }
}

/// Latest state of every sensor and of the tracker outputs
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    pub gnss: Shared<GnssFix>,
    pub acoustic: Shared<AcousticReading>,
    pub depth: Shared<DepthReading>,
    pub raw_target: Shared<Option<RawTargetFix>>,
    pub filtered_target: Shared<Option<FilteredTargetFix>>,
}
