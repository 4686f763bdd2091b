//! Symbolic reference reservations.
//!
//! Every container has a hard limit on the number of type, string and method references it
//! may hold. Passes that synthesize code after containers have been laid out must reserve the
//! references they will introduce up front, so the container writer keeps room for them.
//!
//! Reservations are identified by opaque [`ReservedRefsHandle`]s. A handle is released exactly
//! once; releasing an unknown or already released handle is an error. [`ReservationGuard`]
//! ties a handle to a scope and releases it on every exit path.

use std::{
    ops::AddAssign,
    sync::atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tracing::warn;

use crate::{Error, Result};

/// Number of references of each kind a pass wants to keep available per container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReserveRefsInfo {
    /// Type references.
    pub type_refs: usize,
    /// String references.
    pub string_refs: usize,
    /// Method references.
    pub method_refs: usize,
}

impl ReserveRefsInfo {
    /// Creates a reservation request.
    #[must_use]
    pub const fn new(type_refs: usize, string_refs: usize, method_refs: usize) -> Self {
        ReserveRefsInfo {
            type_refs,
            string_refs,
            method_refs,
        }
    }
}

impl AddAssign for ReserveRefsInfo {
    fn add_assign(&mut self, rhs: Self) {
        self.type_refs += rhs.type_refs;
        self.string_refs += rhs.string_refs;
        self.method_refs += rhs.method_refs;
    }
}

/// Opaque handle for one outstanding reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservedRefsHandle(u64);

impl ReservedRefsHandle {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Reservation {
    pass: String,
    info: ReserveRefsInfo,
}

/// Thread-safe registry of reference reservations.
#[derive(Debug, Default)]
pub struct RefReservations {
    next: AtomicU64,
    held: DashMap<u64, Reservation>,
}

impl RefReservations {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves references on behalf of `pass`.
    pub fn reserve(&self, pass: &str, info: ReserveRefsInfo) -> ReservedRefsHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.held.insert(
            id,
            Reservation {
                pass: pass.to_string(),
                info,
            },
        );
        ReservedRefsHandle(id)
    }

    /// Releases a reservation and returns what it held.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownReservation`] if the handle is not currently held.
    pub fn release(&self, handle: ReservedRefsHandle) -> Result<ReserveRefsInfo> {
        self.held
            .remove(&handle.0)
            .map(|(_, reservation)| reservation.info)
            .ok_or(Error::UnknownReservation(handle.0))
    }

    /// Returns the sum of all outstanding reservations.
    #[must_use]
    pub fn total_reserved(&self) -> ReserveRefsInfo {
        let mut total = ReserveRefsInfo::default();
        for entry in self.held.iter() {
            total += entry.value().info;
        }
        total
    }

    /// Returns the reservation held under `handle`, if still outstanding.
    #[must_use]
    pub fn get(&self, handle: ReservedRefsHandle) -> Option<ReserveRefsInfo> {
        self.held.get(&handle.0).map(|entry| entry.info)
    }

    /// Returns the names of passes holding outstanding reservations, sorted.
    #[must_use]
    pub fn outstanding(&self) -> Vec<String> {
        let mut passes: Vec<String> = self.held.iter().map(|e| e.value().pass.clone()).collect();
        passes.sort();
        passes
    }
}

/// Releases a reservation when dropped, unless it was released explicitly before.
pub struct ReservationGuard<'a> {
    reservations: &'a RefReservations,
    handle: Option<ReservedRefsHandle>,
}

impl<'a> ReservationGuard<'a> {
    /// Takes responsibility for releasing `handle`.
    #[must_use]
    pub fn new(reservations: &'a RefReservations, handle: ReservedRefsHandle) -> Self {
        ReservationGuard {
            reservations,
            handle: Some(handle),
        }
    }

    /// Returns the guarded handle.
    #[must_use]
    pub fn handle(&self) -> Option<ReservedRefsHandle> {
        self.handle
    }

    /// Releases the reservation now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownReservation`] if the handle was released behind the guard's back.
    pub fn release(mut self) -> Result<ReserveRefsInfo> {
        match self.handle.take() {
            Some(handle) => self.reservations.release(handle),
            None => Err(invariant_error!("reservation guard released twice")),
        }
    }
}

impl Drop for ReservationGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.reservations.release(handle) {
                warn!("Failed to release reservation {}: {e}", handle.id());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let reservations = RefReservations::new();
        let a = reservations.reserve("a", ReserveRefsInfo::new(1, 0, 3));
        let b = reservations.reserve("b", ReserveRefsInfo::new(0, 2, 1));
        assert_ne!(a, b);
        assert_eq!(reservations.total_reserved(), ReserveRefsInfo::new(1, 2, 4));
        assert_eq!(reservations.outstanding(), vec!["a", "b"]);

        assert_eq!(
            reservations.release(a).unwrap(),
            ReserveRefsInfo::new(1, 0, 3)
        );
        assert_eq!(reservations.total_reserved(), ReserveRefsInfo::new(0, 2, 1));
        assert!(matches!(
            reservations.release(a),
            Err(Error::UnknownReservation(_))
        ));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let reservations = RefReservations::new();
        let handle = reservations.reserve("pass", ReserveRefsInfo::new(1, 0, 1));
        {
            let _guard = ReservationGuard::new(&reservations, handle);
            assert!(reservations.get(handle).is_some());
        }
        assert!(reservations.get(handle).is_none());
        assert!(reservations.outstanding().is_empty());
    }

    #[test]
    fn test_guard_explicit_release() {
        let reservations = RefReservations::new();
        let handle = reservations.reserve("pass", ReserveRefsInfo::new(1, 0, 11));
        let guard = ReservationGuard::new(&reservations, handle);
        assert_eq!(guard.release().unwrap(), ReserveRefsInfo::new(1, 0, 11));
        assert!(reservations.outstanding().is_empty());
    }
}
