use serde::{Deserialize, Serialize};

/// Design SQL preprocessing errors. All of these are integrity problems in the
/// input (or its environment) and abort processing of the current file: a
/// partially parsed or miscategorized statement stream must never reach a
/// schema tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// Text that matches no lexical rule, or an unterminated string literal,
    /// block comment or portability macro.
    Lex(String),
    /// Unbalanced parentheses at a statement terminator or end of input.
    Nesting(String),
    /// An invalid meta-statement tag or phase.
    Meta(String),
    /// An invalid metainfo key, body or version number.
    Metainfo(String),
    /// Meta-statements and statements don't alternate.
    Pairing(String),
    /// A statement can't be translated for a driver.
    Translate(String),
    /// Invalid user input, e.g. configuration or command-line arguments.
    InvalidInput(String),
    /// An IO error.
    IO(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Lex(msg) => write!(f, "lex error: {msg}"),
            Error::Nesting(msg) => write!(f, "nesting error: {msg}"),
            Error::Meta(msg) => write!(f, "invalid meta-statement: {msg}"),
            Error::Metainfo(msg) => write!(f, "invalid metainfo: {msg}"),
            Error::Pairing(msg) => write!(f, "pairing error: {msg}"),
            Error::Translate(msg) => write!(f, "translation error: {msg}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
        }
    }
}

/// Constructs an Error::Lex for the given format string.
#[macro_export]
macro_rules! errlex {
    ($($args:tt)*) => { $crate::error::Error::Lex(format!($($args)*)).into() };
}

/// Constructs an Error::Nesting for the given format string.
#[macro_export]
macro_rules! errnest {
    ($($args:tt)*) => { $crate::error::Error::Nesting(format!($($args)*)).into() };
}

/// Constructs an Error::Meta for the given format string.
#[macro_export]
macro_rules! errmeta {
    ($($args:tt)*) => { $crate::error::Error::Meta(format!($($args)*)).into() };
}

/// Constructs an Error::Metainfo for the given format string.
#[macro_export]
macro_rules! errmetainfo {
    ($($args:tt)*) => { $crate::error::Error::Metainfo(format!($($args)*)).into() };
}

/// Constructs an Error::Pairing for the given format string.
#[macro_export]
macro_rules! errpair {
    ($($args:tt)*) => { $crate::error::Error::Pairing(format!($($args)*)).into() };
}

/// Constructs an Error::Translate for the given format string.
#[macro_export]
macro_rules! errtranslate {
    ($($args:tt)*) => { $crate::error::Error::Translate(format!($($args)*)).into() };
}

/// Constructs an Error::InvalidInput for the given format string.
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => { $crate::error::Error::InvalidInput(format!($($args)*)).into() };
}

/// A preprocessor Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<log::ParseLevelError> for Error {
    fn from(err: log::ParseLevelError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<log::SetLoggerError> for Error {
    fn from(err: log::SetLoggerError) -> Self {
        panic!("{err}") // only happens if the logger is initialized twice
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}
