//! Interrupt-safe wrapper around a [`TriggerDecoder`].

use core::cell::RefCell;

use critical_section::Mutex;

use super::{EdgeReport, SyncStatus, ToothLog, TriggerDecoder};
use crate::Micros;

/// Decoder shared between the edge interrupts and the main loop.
///
/// Edge handlers and RPM refreshes run entirely inside a critical section.
/// [`crank_angle`](Self::crank_angle) only copies a [`ToothLog`] under the lock
/// and does the arithmetic after releasing it.
pub struct SharedDecoder {
    inner: Mutex<RefCell<TriggerDecoder>>,
}

impl SharedDecoder {
    #[must_use]
    pub const fn new(decoder: TriggerDecoder) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(decoder)),
        }
    }

    pub fn primary_edge(&self, now: Micros) -> EdgeReport {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).primary_edge(now))
    }

    pub fn secondary_edge(&self, now: Micros) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).secondary_edge(now));
    }

    pub fn tertiary_edge(&self, now: Micros) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).tertiary_edge(now));
    }

    pub fn rpm(&self) -> u16 {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).rpm())
    }

    #[must_use]
    pub fn snapshot(&self) -> ToothLog {
        critical_section::with(|cs| self.inner.borrow_ref(cs).snapshot())
    }

    #[must_use]
    pub fn crank_angle(&self, now: Micros) -> i16 {
        self.snapshot().crank_angle(now)
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        critical_section::with(|cs| self.inner.borrow_ref(cs).sync_status())
    }

    pub fn set_end_teeth(&self, end_angles: &[i16]) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).set_end_teeth(end_angles));
    }

    /// Runs `f` with exclusive access to the decoder.
    pub fn with<R>(&self, f: impl FnOnce(&mut TriggerDecoder) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }
}
