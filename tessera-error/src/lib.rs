#![feature(error_generic_member_access)]
#![deny(missing_docs)]

//! This crate defines error & result types for Tessera.
//! It also contains a variety of useful macros for error handling.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{fmt, io};

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for Tessera.
///
/// Errors a user can cause and fix print only their message. The others also print the
/// backtrace captured when they were created. `{:?}` always includes it.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum TesseraError {
    /// Fewer partitioning columns were requested than a strategy can work with.
    #[error("expected at least {1} partitioning columns, got {0}")]
    InsufficientNumberOfColumns(usize, usize, Backtrace),
    /// The requested partition size cannot hold a single row.
    #[error("partition size must be at least 1, got {0}")]
    InvalidPartitionSize(usize, Backtrace),
    /// A partitioning column is missing from the schema, or has a type that cannot be partitioned on.
    #[error("invalid column: {0}")]
    InvalidColumn(ErrString, Backtrace),
    /// A recursive split reached its depth ceiling. Strategies downgrade this to a forced leaf.
    #[error("recursion limit of {0} reached")]
    RecursionLimitReached(usize, Backtrace),
    /// The partitioning scheme name is not known.
    #[error("unknown partitioning scheme: {0}")]
    UnknownScheme(ErrString, Backtrace),
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Backtrace),
    /// An invalid argument was provided.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Backtrace),
    /// The requested functionality is not supported for the given input.
    #[error("not implemented: {0}\nBacktrace:\n{1}")]
    NotImplemented(ErrString, Backtrace),
    /// An invariant the caller relies on was violated.
    #[error("{0}\nBacktrace:\n{1}")]
    AssertionFailed(ErrString, Backtrace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<TesseraError>),
    /// A wrapper for errors from the Arrow library.
    #[error("{0}\nBacktrace:\n{1}")]
    ArrowError(#[from] arrow_schema::ArrowError, Backtrace),
    /// A wrapper for errors from the Parquet library.
    #[error("{0}\nBacktrace:\n{1}")]
    ParquetError(#[from] parquet::errors::ParquetError, Backtrace),
    /// A wrapper for IO errors.
    #[error("{0}")]
    IOError(#[from] io::Error, Backtrace),
}

impl TesseraError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        TesseraError::Context(msg.into(), Box::new(self))
    }

    /// Returns true if the error, or any error it wraps, originates from the filesystem or a
    /// columnar file codec.
    pub fn is_io_failure(&self) -> bool {
        match self {
            TesseraError::IOError(..)
            | TesseraError::ParquetError(..)
            | TesseraError::ArrowError(..) => true,
            TesseraError::Context(_, inner) => inner.is_io_failure(),
            _ => false,
        }
    }

    /// Backtrace captured when the error was created.
    pub fn backtrace(&self) -> &Backtrace {
        match self {
            TesseraError::InsufficientNumberOfColumns(_, _, bt)
            | TesseraError::OutOfBounds(_, _, _, bt) => bt,
            TesseraError::InvalidPartitionSize(_, bt)
            | TesseraError::RecursionLimitReached(_, bt)
            | TesseraError::InvalidColumn(_, bt)
            | TesseraError::UnknownScheme(_, bt)
            | TesseraError::InvalidArgument(_, bt)
            | TesseraError::NotImplemented(_, bt)
            | TesseraError::AssertionFailed(_, bt)
            | TesseraError::ArrowError(_, bt)
            | TesseraError::ParquetError(_, bt)
            | TesseraError::IOError(_, bt) => bt,
            TesseraError::Context(_, inner) => inner.backtrace(),
        }
    }

    /// Whether the message is printed without its backtrace.
    fn is_user_facing(&self) -> bool {
        match self {
            TesseraError::InsufficientNumberOfColumns(..)
            | TesseraError::InvalidPartitionSize(..)
            | TesseraError::InvalidColumn(..)
            | TesseraError::RecursionLimitReached(..)
            | TesseraError::UnknownScheme(..)
            | TesseraError::IOError(..) => true,
            TesseraError::Context(_, inner) => inner.is_user_facing(),
            _ => false,
        }
    }

    /// Short name of the error kind, used when reporting errors to users.
    pub fn kind(&self) -> &'static str {
        match self {
            TesseraError::InsufficientNumberOfColumns(..) => "InsufficientNumberOfColumns",
            TesseraError::InvalidPartitionSize(..) => "InvalidPartitionSize",
            TesseraError::InvalidColumn(..) => "InvalidColumn",
            TesseraError::RecursionLimitReached(..) => "RecursionLimitReached",
            TesseraError::UnknownScheme(..) => "UnknownScheme",
            TesseraError::OutOfBounds(..) => "OutOfBounds",
            TesseraError::InvalidArgument(..) => "InvalidArgument",
            TesseraError::NotImplemented(..) => "NotImplemented",
            TesseraError::AssertionFailed(..) => "AssertionFailed",
            TesseraError::Context(_, inner) => inner.kind(),
            TesseraError::ArrowError(..)
            | TesseraError::ParquetError(..)
            | TesseraError::IOError(..) => "IOFailure",
        }
    }
}

impl Debug for TesseraError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)?;
        if self.is_user_facing() {
            write!(f, "\nBacktrace:\n{}", self.backtrace())?;
        }
        Ok(())
    }
}

/// A type alias for Results that return TesseraErrors as their error type.
pub type TesseraResult<T> = Result<T, TesseraError>;

#[doc(hidden)]
pub mod __private {
    use crate::TesseraError;

    #[doc(hidden)]
    #[inline]
    #[must_use]
    pub const fn must_use(err: TesseraError) -> TesseraError {
        err
    }

    #[doc(hidden)]
    #[cold]
    #[track_caller]
    #[allow(clippy::panic)]
    pub fn panic(err: TesseraError) -> ! {
        panic!("{}", err)
    }
}

/// A convenient macro for creating a TesseraError.
#[macro_export]
macro_rules! tessera_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::TesseraError::OutOfBounds(
            $idx,
            $start,
            $stop,
            Backtrace::capture(),
        ))
    }};
    (InsufficientNumberOfColumns: $found:expr, $min:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::TesseraError::InsufficientNumberOfColumns(
            $found,
            $min,
            Backtrace::capture(),
        ))
    }};
    (InvalidPartitionSize: $size:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::TesseraError::InvalidPartitionSize(
            $size,
            Backtrace::capture(),
        ))
    }};
    (RecursionLimitReached: $depth:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::TesseraError::RecursionLimitReached(
            $depth,
            Backtrace::capture(),
        ))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::TesseraError::$variant(
            format!($fmt, $($arg),*).into(),
            Backtrace::capture(),
        ))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::tessera_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenience macro for creating a TesseraError and returning it from the enclosing function.
#[macro_export]
macro_rules! tessera_bail {
    ($($tt:tt)+) => {
        return Err($crate::tessera_err!($($tt)+))
    };
}

/// A convenience macro for panicking with a TesseraError.
#[macro_export]
macro_rules! tessera_panic {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::panic($crate::tessera_err!($variant: $fmt, $($arg),*))
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::panic($crate::tessera_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::TesseraError = $err;
        $crate::__private::panic(err)
    }};
}

/// A trait for unwrapping a TesseraResult.
pub trait TesseraUnwrap {
    /// The type of the value being unwrapped.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn tessera_unwrap(self) -> Self::Output;
}

impl<T, E> TesseraUnwrap for Result<T, E>
where
    E: Into<TesseraError>,
{
    type Output = T;

    #[inline(always)]
    fn tessera_unwrap(self) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|err| tessera_panic!(err))
    }
}

/// A trait for expect-ing a TesseraResult or an Option.
pub trait TesseraExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn tessera_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> TesseraExpect for Result<T, E>
where
    E: Into<TesseraError>,
{
    type Output = T;

    #[inline(always)]
    fn tessera_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| tessera_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> TesseraExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn tessera_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = TesseraError::AssertionFailed(msg.to_string().into(), Backtrace::capture());
            tessera_panic!(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use rstest::rstest;

    use crate::{TesseraError, TesseraResult};

    fn bail_on_zero(value: usize) -> TesseraResult<usize> {
        if value == 0 {
            tessera_bail!(InvalidPartitionSize: value);
        }
        Ok(value)
    }

    #[rstest]
    #[case(tessera_err!(InsufficientNumberOfColumns: 1, 2), "InsufficientNumberOfColumns")]
    #[case(tessera_err!(InvalidPartitionSize: 0), "InvalidPartitionSize")]
    #[case(tessera_err!(InvalidColumn: "{} not in schema", "Age"), "InvalidColumn")]
    #[case(tessera_err!(RecursionLimitReached: 32), "RecursionLimitReached")]
    #[case(tessera_err!("plain message"), "InvalidArgument")]
    #[case(TesseraError::from(io::Error::other("disk gone")), "IOFailure")]
    fn reports_kind(#[case] err: TesseraError, #[case] kind: &str) {
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn context_keeps_inner_kind() {
        let err = TesseraError::from(io::Error::other("disk gone")).with_context("writing 0.parquet");
        assert_eq!(err.kind(), "IOFailure");
        assert!(err.is_io_failure());
        assert!(err.to_string().starts_with("writing 0.parquet: disk gone"));
    }

    #[rstest]
    #[case(tessera_err!(UnknownScheme: "r-tree"), "unknown partitioning scheme: r-tree")]
    #[case(
        tessera_err!(InvalidColumn: "Grade is not a column"),
        "invalid column: Grade is not a column"
    )]
    #[case(
        tessera_err!(InsufficientNumberOfColumns: 1, 2),
        "expected at least 2 partitioning columns, got 1"
    )]
    #[case(tessera_err!(InvalidPartitionSize: 0), "partition size must be at least 1, got 0")]
    #[case(tessera_err!(RecursionLimitReached: 32), "recursion limit of 32 reached")]
    #[case(TesseraError::from(io::Error::other("disk gone")), "disk gone")]
    #[case(
        tessera_err!(UnknownScheme: "r-tree").with_context("building the partitioner"),
        "building the partitioner: unknown partitioning scheme: r-tree"
    )]
    fn user_facing_errors_print_only_their_message(
        #[case] err: TesseraError,
        #[case] message: &str,
    ) {
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn internal_errors_keep_their_backtrace() {
        let err = tessera_err!("plain message");
        assert!(err.to_string().starts_with("plain message\nBacktrace:\n"));
    }

    #[test]
    fn bail_returns_error() {
        assert!(matches!(
            bail_on_zero(0),
            Err(TesseraError::InvalidPartitionSize(0, _))
        ));
        assert_eq!(bail_on_zero(3).ok(), Some(3));
    }
}
