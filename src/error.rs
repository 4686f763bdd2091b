use thiserror::Error;

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Rejected transformation candidates and exhausted per-container budgets are *not* errors;
/// passes report those through their metrics. An `Err` leaving a pass means the run must stop.
///
/// # Error Categories
///
/// ## Programmer defects
/// - [`Error::Invariant`] - An internal consistency check failed (duplicate ordinals,
///   blocks consumed by two decision trees, leaked reservations, ...)
/// - [`Error::UnknownReservation`] - A reference reservation was released twice or never issued
///
/// ## Input and configuration errors
/// - [`Error::Config`] - A pass configuration is self-contradictory
/// - [`Error::InvalidReference`] - A type or method descriptor could not be parsed
/// - [`Error::Encoding`] - A lookup table could not be encoded from the provided entries
///
/// # Examples
///
/// ```rust
/// use dexopt::{metadata::MethodRef, Error};
///
/// match MethodRef::parse("not a method") {
///     Ok(method) => println!("parsed {method}"),
///     Err(Error::InvalidReference(descriptor)) => eprintln!("bad descriptor: {descriptor}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An internal invariant of a pass was violated.
    ///
    /// This indicates a correctness bug in the matcher or the code synthesizer, not a property
    /// of the input program. It terminates the run.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violated - {file}:{line}: {message}")]
    Invariant {
        /// The message to be printed for the Invariant error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A pass configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A type, field or method descriptor could not be parsed.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The string-tree encoder rejected its input.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// A reservation handle was released that is not currently held.
    #[error("Unknown reservation handle {0}")]
    UnknownReservation(u64),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
