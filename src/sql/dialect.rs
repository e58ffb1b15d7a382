use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::{errinput, errtranslate};

/// A portability item, e.g. [:table schema=cerebrum name=person_info]: an
/// operation and its keyword arguments, to be expanded into the SQL dialect
/// of a specific RDBMS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortabilityItem {
    pub op: String,
    pub args: BTreeMap<String, String>,
}

impl PortabilityItem {
    /// Creates a portability item without arguments.
    pub fn new(op: impl Into<String>) -> Self {
        Self { op: op.into(), args: BTreeMap::new() }
    }

    /// Adds a key=value argument. Keys may only be given once.
    pub fn push_arg(&mut self, arg: &str) -> Result<()> {
        let Some((key, value)) = arg.split_once('=') else {
            return errtranslate!("invalid argument {arg} for portability op {}", self.op);
        };
        if self.args.insert(key.to_string(), value.to_string()).is_some() {
            return errtranslate!("argument {key} given multiple times for portability op {}", self.op);
        }
        Ok(())
    }

    /// Returns the values of exactly the given argument keys, in order.
    /// Missing and unexpected arguments are errors.
    pub fn args<const N: usize>(&self, keys: [&str; N]) -> Result<[&str; N]> {
        if let Some(key) = self.args.keys().find(|key| !keys.contains(&key.as_str())) {
            return errtranslate!("unexpected argument {key} for portability op {}", self.op);
        }
        let mut values = [""; N];
        for (value, key) in values.iter_mut().zip(keys) {
            *value = self.args.get(key).map(String::as_str).ok_or_else(|| {
                Error::Translate(format!("portability op {} requires argument {key}", self.op))
            })?;
        }
        Ok(values)
    }
}

impl std::fmt::Display for PortabilityItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[:{}", self.op)?;
        for (key, value) in &self.args {
            write!(f, " {key}={value}")?;
        }
        write!(f, "]")
    }
}

/// An SQL dialect, which expands portability items into SQL tokens.
pub trait Dialect {
    /// The RDBMS name, as used in meta-statement qualifiers.
    fn name(&self) -> &'static str;

    /// Expands a portability item into a sequence of SQL tokens.
    fn expand(&self, item: &PortabilityItem) -> Result<Vec<String>>;
}

/// Returns the dialect for an RDBMS name (case-insensitive).
pub fn dialect_for(name: &str) -> Result<Box<dyn Dialect>> {
    match name.to_lowercase().as_str() {
        "postgres" | "postgresql" | "pg" => Ok(Box::new(PostgreSQL)),
        "oracle" => Ok(Box::new(Oracle)),
        _ => errinput!("unknown RDBMS {name}"),
    }
}

/// The PostgreSQL dialect. Schemas are implicit via the search path.
pub struct PostgreSQL;

impl Dialect for PostgreSQL {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn expand(&self, item: &PortabilityItem) -> Result<Vec<String>> {
        Ok(match item.op.as_str() {
            "table" => {
                let [_, name] = item.args(["schema", "name"])?;
                vec![name.to_string()]
            }
            "sequence" => {
                let [_, name, op] = item.args(["schema", "name", "op"])?;
                match op {
                    "next" => vec![format!("nextval('{name}')")],
                    "current" => vec![format!("currval('{name}')")],
                    op => return errtranslate!("invalid sequence operation {op}"),
                }
            }
            "sequence_start" => {
                let [value] = item.args(["value"])?;
                vec!["START".to_string(), value.to_string()]
            }
            "from_dual" => {
                item.args([])?;
                vec![]
            }
            "now" => {
                item.args([])?;
                vec!["NOW()".to_string()]
            }
            op => return errtranslate!("unknown portability op {op} for {}", self.name()),
        })
    }
}

/// The Oracle dialect.
pub struct Oracle;

impl Dialect for Oracle {
    fn name(&self) -> &'static str {
        "Oracle"
    }

    fn expand(&self, item: &PortabilityItem) -> Result<Vec<String>> {
        Ok(match item.op.as_str() {
            "table" => {
                let [schema, name] = item.args(["schema", "name"])?;
                vec![format!("{schema}.{name}")]
            }
            "sequence" => {
                let [schema, name, op] = item.args(["schema", "name", "op"])?;
                match op {
                    "next" => vec![format!("{schema}.{name}.nextval")],
                    "current" => vec![format!("{schema}.{name}.currval")],
                    op => return errtranslate!("invalid sequence operation {op}"),
                }
            }
            "sequence_start" => {
                let [value] = item.args(["value"])?;
                vec!["START".to_string(), "WITH".to_string(), value.to_string()]
            }
            "from_dual" => {
                item.args([])?;
                vec!["FROM".to_string(), "DUAL".to_string()]
            }
            "now" => {
                item.args([])?;
                vec!["SYSDATE".to_string()]
            }
            op => return errtranslate!("unknown portability op {op} for {}", self.name()),
        })
    }
}
