//! Design files: the Cerebrum SQL files that define a database schema.
//!
//! A design file is a sequence of statements, each preceded by a
//! meta-statement that assigns it to a schema construction phase and
//! optionally to a single RDBMS:
//!
//! ```sql
//! category:metainfo;
//! name=core;
//!
//! category:main/Oracle;
//! CREATE SEQUENCE entity_id_seq NOCACHE;
//! ```
//!
//! Processing is a lazy pipeline. [`parse_sql_file`] splits a file into
//! comment-free statement strings, [`categorize`] pairs each statement with
//! its meta-statement, and [`parse_metainfo`] parses the bodies of metainfo
//! statements. Any error aborts processing of the file.

mod file;
mod meta;
mod metainfo;

pub use file::{RawStatement, Statements, parse_sql_file};
pub use meta::{
    Categorize, CategorizedStatement, MetaStatement, Phase, Tag, categorize, parse_meta_statement,
};
pub use metainfo::{MetainfoKey, MetainfoValue, Version, parse_metainfo};
