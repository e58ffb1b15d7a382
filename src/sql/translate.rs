use std::collections::{BTreeSet, HashMap};

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use super::dialect::{Dialect, PortabilityItem};
use super::scanner::{Scanner, TokenKind};
use crate::error::{Error, Result};
use crate::{errinput, errtranslate};

/// A DB-API style bind parameter convention. Statements are written with
/// named parameters (:name), and rewritten to the driver's style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamStyle {
    /// WHERE a = ?
    Qmark,
    /// WHERE a = %s
    Format,
    /// WHERE a = :1
    Numeric,
    /// WHERE a = :a
    #[default]
    Named,
    /// WHERE a = %(a)s
    Pyformat,
}

impl ParamStyle {
    /// Rewrites a bind parameter, recording its position in order where the
    /// style is positional.
    fn register(&self, name: &str, order: &mut Vec<String>) -> String {
        match self {
            Self::Qmark => {
                order.push(name.to_string());
                "?".to_string()
            }
            Self::Format => {
                order.push(name.to_string());
                "%s".to_string()
            }
            // Repeated parameters reuse the index of the first occurrence.
            Self::Numeric => {
                let index = match order.iter().position(|n| n == name) {
                    Some(index) => index,
                    None => {
                        order.push(name.to_string());
                        order.len() - 1
                    }
                };
                format!(":{}", index + 1)
            }
            Self::Named => format!(":{name}"),
            Self::Pyformat => format!("%({name})s"),
        }
    }
}

impl std::fmt::Display for ParamStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Qmark => "qmark",
            Self::Format => "format",
            Self::Numeric => "numeric",
            Self::Named => "named",
            Self::Pyformat => "pyformat",
        })
    }
}

impl std::str::FromStr for ParamStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "qmark" => Ok(Self::Qmark),
            "format" => Ok(Self::Format),
            "numeric" => Ok(Self::Numeric),
            "named" => Ok(Self::Named),
            "pyformat" => Ok(Self::Pyformat),
            _ => errinput!("unknown paramstyle {s}"),
        }
    }
}

/// A statement translated for a specific driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Translation {
    /// The driver SQL text.
    pub sql: String,
    /// Bind parameter names in the positional order the driver expects. Empty
    /// for named paramstyles, which take a mapping.
    pub order: Vec<String>,
    /// All bind parameter names used by the statement.
    pub names: BTreeSet<String>,
}

impl Translation {
    /// Returns the values for the positional parameters, in order. All
    /// parameters used by the statement must have a value.
    pub fn bind<'v, V>(&self, params: &'v HashMap<String, V>) -> Result<Vec<&'v V>> {
        if let Some(name) = self.names.iter().find(|name| !params.contains_key(*name)) {
            return errtranslate!("bind parameter :{name} has no value");
        }
        self.order
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .ok_or_else(|| Error::Translate(format!("bind parameter :{name} has no value")))
            })
            .collect()
    }
}

/// Translates a single SQL statement for a driver: portability items are
/// expanded via the dialect, and bind parameters rewritten to the given
/// paramstyle. The output tokens are joined by single spaces, and the
/// statement terminator is dropped. Any token after the terminator is an
/// error: callers must pass one statement at a time.
pub fn translate(statement: &str, dialect: &dyn Dialect, style: ParamStyle) -> Result<Translation> {
    let mut output: Vec<String> = Vec::new();
    let mut order = Vec::new();
    let mut names = BTreeSet::new();
    let mut item: Option<PortabilityItem> = None;
    let mut done = false;

    for token in Scanner::new(statement) {
        let token = token?;
        if done {
            return errtranslate!("token {} found after end of statement", token.text);
        }
        // Collect arguments for the current portability item, and expand it
        // once all arguments have been seen.
        if token.kind == TokenKind::PortabilityArg {
            match item.as_mut() {
                Some(item) => item.push_arg(&token.text)?,
                None => return errtranslate!("portability argument {} without op", token.text),
            }
            continue;
        }
        if let Some(item) = item.take() {
            output.extend(dialect.expand(&item)?);
        }
        match token.kind {
            TokenKind::EndOfStatement => done = true,
            TokenKind::PortabilityFunction => item = Some(PortabilityItem::new(token.text)),
            TokenKind::BindParameter => {
                let name = token.text.strip_prefix(':').unwrap_or(&token.text);
                names.insert(name.to_string());
                output.push(style.register(name, &mut order));
            }
            _ => output.push(token.text),
        }
    }
    // The statement may end with a portability item.
    if let Some(item) = item.take() {
        output.extend(dialect.expand(&item)?);
    }

    Ok(Translation { sql: output.iter().join(" "), order, names })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::{Oracle, PostgreSQL};
    use pretty_assertions::assert_eq;

    #[test]
    fn paramstyles() -> Result<()> {
        let statement = "SELECT * FROM t WHERE a = :a AND b = :b OR a > :a";
        let cases = [
            (ParamStyle::Qmark, "? AND b = ? OR a > ?", vec!["a", "b", "a"]),
            (ParamStyle::Format, "%s AND b = %s OR a > %s", vec!["a", "b", "a"]),
            (ParamStyle::Numeric, ":1 AND b = :2 OR a > :1", vec!["a", "b"]),
            (ParamStyle::Named, ":a AND b = :b OR a > :a", vec![]),
            (ParamStyle::Pyformat, "%(a)s AND b = %(b)s OR a > %(a)s", vec![]),
        ];
        for (style, tail, order) in cases {
            let translation = translate(statement, &PostgreSQL, style)?;
            assert_eq!(translation.sql, format!("SELECT * FROM t WHERE a = {tail}"), "{style}");
            assert_eq!(translation.order, order, "{style}");
            assert_eq!(translation.names, BTreeSet::from(["a".to_string(), "b".to_string()]));
        }
        Ok(())
    }

    #[test]
    fn portability() -> Result<()> {
        let statement = "SELECT [:sequence schema=cerebrum name=entity_id_seq op=next] [:from_dual];";
        assert_eq!(
            translate(statement, &PostgreSQL, ParamStyle::Named)?.sql,
            "SELECT nextval('entity_id_seq')"
        );
        assert_eq!(
            translate(statement, &Oracle, ParamStyle::Named)?.sql,
            "SELECT cerebrum.entity_id_seq.nextval FROM DUAL"
        );
        assert_eq!(
            translate("UPDATE [:table schema=cerebrum name=t] SET ts=[:now]", &Oracle, ParamStyle::Named)?.sql,
            "UPDATE cerebrum.t SET ts = SYSDATE"
        );
        Ok(())
    }

    #[test]
    fn errors() {
        assert_eq!(
            translate("SELECT 1; SELECT 2", &PostgreSQL, ParamStyle::Named),
            Err(Error::Translate("token SELECT found after end of statement".into()))
        );
        assert_eq!(
            translate("SELECT [:table name=a name=b]", &PostgreSQL, ParamStyle::Named),
            Err(Error::Translate("argument name given multiple times for portability op table".into()))
        );
        assert_eq!(
            translate("SELECT [:x=1]", &PostgreSQL, ParamStyle::Named),
            Err(Error::Translate("portability argument x=1 without op".into()))
        );
        assert!(matches!(
            translate("SELECT (1", &PostgreSQL, ParamStyle::Named),
            Err(Error::Nesting(_))
        ));
    }

    #[test]
    fn bind() -> Result<()> {
        let translation = translate("SELECT :b, :a, :b", &PostgreSQL, ParamStyle::Qmark)?;
        let params = HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]);
        assert_eq!(translation.bind(&params)?, vec![&2, &1, &2]);

        let params = HashMap::from([("a".to_string(), 1)]);
        assert_eq!(
            translation.bind(&params),
            Err(Error::Translate("bind parameter :b has no value".into()))
        );

        // Named styles bind by mapping, but missing values are still errors.
        let translation = translate("SELECT :a", &PostgreSQL, ParamStyle::Named)?;
        assert_eq!(translation.bind(&HashMap::from([("a".to_string(), 1)]))?, Vec::<&i32>::new());
        Ok(())
    }
}
