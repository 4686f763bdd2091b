//! Shared unit test scaffolding.

pub(crate) mod helpers;
