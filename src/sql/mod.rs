//! Statement-level processing of Cerebrum SQL: the scanner, which tokenizes
//! statement text, and the translator, which uses the tokens to rewrite a
//! statement for a specific driver and RDBMS.

pub mod dialect;
pub mod scanner;
pub mod translate;

pub use dialect::{Dialect, Oracle, PortabilityItem, PostgreSQL, dialect_for};
pub use scanner::{Scanner, Token, TokenKind};
pub use translate::{ParamStyle, Translation, translate};
