//! Utility codecs shared by the optimizer passes.
//!
//! - [`stringtree`] - String-to-ordinal lookup tables serialized as printable text

pub mod stringtree;
