//! Utility macros shared by the decoders.

/// Returns early with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// It's used while validating compressed stream headers, where a broken header should
/// surface as an error to the caller rather than abort the process.
///
/// # Example
///
/// ```ignore
/// ensure!(method == 8, DecodeInitError::UnsupportedMethod { encoding, method });
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error.into());
        }
    };
}

pub(crate) use ensure;
