//! Object model of the program being optimized.
//!
//! - [`types`] - Type, field and method references and their canonical orderings
//! - [`class`] / [`method`] - Class and method definitions
//! - [`program`] - Containers (physical output files) and the whole program
//! - [`refs`] - Per-container symbolic reference reservations

pub mod class;
pub mod method;
pub mod program;
pub mod refs;
pub mod types;

pub use class::DexClass;
pub use method::{AccessFlags, DexMethod};
pub use program::{DexFile, Program};
pub use refs::{RefReservations, ReservationGuard, ReserveRefsInfo, ReservedRefsHandle};
pub use types::{FieldRef, MethodRef, Proto, TypeName};
