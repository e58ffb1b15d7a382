use serde::{Deserialize, Serialize};

use super::file::RawStatement;
use crate::error::{Error, Result};
use crate::{errmeta, errpair};

/// A meta-statement tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Category,
}

impl Tag {
    /// Looks up a tag by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "category" => Some(Self::Category),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema construction phase. Schema tools select statements by phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Metadata about the design file itself, e.g. its name and version.
    Metainfo,
    /// Functions and other code.
    Code,
    /// Tables, sequences, indexes and initial rows.
    Main,
    /// Statements that tear the schema down again.
    Drop,
    /// Migration steps run before the main phase.
    Pre,
    /// Migration steps run after the main phase.
    Post,
}

impl Phase {
    pub const ALL: [Phase; 6] =
        [Phase::Metainfo, Phase::Code, Phase::Main, Phase::Drop, Phase::Pre, Phase::Post];

    /// Looks up a phase by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metainfo => "metainfo",
            Self::Code => "code",
            Self::Main => "main",
            Self::Drop => "drop",
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::Meta(format!("invalid phase {s}")))
    }
}

/// A parsed meta-statement, e.g. category:main/Oracle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaStatement {
    pub tag: Tag,
    pub phase: Phase,
    /// The RDBMS the following statement is specific to, if any.
    pub rdbms: Option<String>,
}

impl std::fmt::Display for MetaStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tag, self.phase)?;
        if let Some(rdbms) = &self.rdbms {
            write!(f, "/{rdbms}")?;
        }
        Ok(())
    }
}

/// Parses a meta-statement of the form tag:phase or tag:phase/rdbms.
pub fn parse_meta_statement(line: &str) -> Result<MetaStatement> {
    let Some((tag, rest)) = line.split_once(':') else {
        return errmeta!("missing tag in {line:?}");
    };
    let Some(tag) = Tag::from_name(tag) else {
        return errmeta!("invalid tag {tag:?} in {line:?}");
    };
    let (phase, rdbms) = match rest.split_once('/') {
        Some((_, "")) => return errmeta!("empty rdbms in {line:?}"),
        Some((phase, rdbms)) => (phase, Some(rdbms.to_string())),
        None => (rest, None),
    };
    let Some(phase) = Phase::from_name(phase) else {
        return errmeta!("invalid phase {phase:?} in {line:?}");
    };
    Ok(MetaStatement { tag, phase, rdbms })
}

/// Returns true if the text has the shape of a meta-statement, i.e. starts
/// with an identifier followed by a colon. SQL statements never do.
fn is_meta_shaped(text: &str) -> bool {
    text.split_once(':').is_some_and(|(tag, _)| {
        let mut chars = tag.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// A statement paired with the meta-statement preceding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedStatement {
    pub category: Tag,
    pub phase: Phase,
    pub rdbms: Option<String>,
    pub statement: String,
    /// The source line of the statement, or 0 if unknown.
    pub line: usize,
}

impl CategorizedStatement {
    /// Returns the meta-statement of this statement.
    pub fn meta(&self) -> MetaStatement {
        MetaStatement { tag: self.category, phase: self.phase, rdbms: self.rdbms.clone() }
    }

    /// Returns true if the statement applies to the given RDBMS: either it is
    /// not RDBMS-specific, or it is specific to this one (case-insensitive).
    pub fn applies_to(&self, rdbms: &str) -> bool {
        self.rdbms.as_deref().is_none_or(|r| r.eq_ignore_ascii_case(rdbms))
    }
}

/// Pairs each statement with the meta-statement before it. The input must
/// strictly alternate between meta-statements and statements.
pub fn categorize<I>(statements: I) -> Categorize<I::IntoIter>
where
    I: IntoIterator<Item = Result<RawStatement>>,
{
    Categorize { statements: statements.into_iter(), pending: None, done: false }
}

/// An iterator over categorized statements, see categorize().
///
/// A statement without a pending meta-statement, a meta-statement while
/// another is pending, or a meta-statement at the end without a statement are
/// pairing errors. Errors from the input are passed through. The iterator
/// yields no further items after an error.
pub struct Categorize<I> {
    statements: I,
    /// The meta-statement awaiting its statement, and its line.
    pending: Option<(MetaStatement, usize)>,
    done: bool,
}

impl<I: Iterator<Item = Result<RawStatement>>> Categorize<I> {
    fn categorize_next(&mut self) -> Result<Option<CategorizedStatement>> {
        while let Some(statement) = self.statements.next().transpose()? {
            let Some((meta, _)) = self.pending.take() else {
                if !is_meta_shaped(&statement.text) {
                    return errpair!("missing category tag before statement {}", statement.describe());
                }
                self.pending = Some((parse_meta_statement(&statement.text)?, statement.line));
                continue;
            };
            if is_meta_shaped(&statement.text)
                && statement.text.split_once(':').and_then(|(tag, _)| Tag::from_name(tag)).is_some()
            {
                return errpair!(
                    "unexpected meta-statement {} after {meta}, expected a statement",
                    statement.describe()
                );
            }
            return Ok(Some(CategorizedStatement {
                category: meta.tag,
                phase: meta.phase,
                rdbms: meta.rdbms,
                statement: statement.text,
                line: statement.line,
            }));
        }
        if let Some((meta, line)) = self.pending.take() {
            return match line {
                0 => errpair!("meta-statement {meta} has no statement"),
                line => errpair!("meta-statement {meta} at line {line} has no statement"),
            };
        }
        Ok(None)
    }
}

impl<I: Iterator<Item = Result<RawStatement>>> Iterator for Categorize<I> {
    type Item = Result<CategorizedStatement>;

    fn next(&mut self) -> Option<Result<CategorizedStatement>> {
        if self.done {
            return None;
        }
        let result = self.categorize_next().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn categorize_strs(statements: &[&str]) -> Vec<Result<CategorizedStatement>> {
        categorize(statements.iter().map(|s| Ok(RawStatement::from(*s)))).collect()
    }

    fn categorized(phase: Phase, rdbms: Option<&str>, statement: &str) -> CategorizedStatement {
        CategorizedStatement {
            category: Tag::Category,
            phase,
            rdbms: rdbms.map(str::to_string),
            statement: statement.to_string(),
            line: 0,
        }
    }

    #[test]
    fn meta_statement() -> Result<()> {
        assert_eq!(
            parse_meta_statement("category:metainfo")?,
            MetaStatement { tag: Tag::Category, phase: Phase::Metainfo, rdbms: None }
        );
        assert_eq!(
            parse_meta_statement("category:main/Oracle")?,
            MetaStatement { tag: Tag::Category, phase: Phase::Main, rdbms: Some("Oracle".into()) }
        );
        // Only the first / splits.
        assert_eq!(parse_meta_statement("category:code/a/b")?.rdbms.as_deref(), Some("a/b"));
        assert_eq!(parse_meta_statement("category:drop/postgres")?.to_string(), "category:drop/postgres");
        Ok(())
    }

    #[test]
    fn meta_statement_errors() {
        assert_eq!(
            parse_meta_statement("category:invalidphase"),
            Err(Error::Meta(r#"invalid phase "invalidphase" in "category:invalidphase""#.into()))
        );
        assert_eq!(
            parse_meta_statement("kategori:main"),
            Err(Error::Meta(r#"invalid tag "kategori" in "kategori:main""#.into()))
        );
        assert_eq!(
            parse_meta_statement("category:main/"),
            Err(Error::Meta(r#"empty rdbms in "category:main/""#.into()))
        );
        assert!(parse_meta_statement("category").is_err());
        // Phases are case-sensitive.
        assert!(parse_meta_statement("category:MAIN").is_err());
    }

    #[test]
    fn phase_from_str() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>(), Ok(phase));
        }
        assert!("final".parse::<Phase>().is_err());
    }

    #[test]
    fn pairing() {
        let create_pg = "CREATE SEQUENCE s";
        let create_ora = "CREATE SEQUENCE s NOCACHE";
        let drop = "DROP SEQUENCE s";
        assert_eq!(
            categorize_strs(&[
                "category:metainfo",
                "name=foo",
                "category:main/postgres",
                create_pg,
                "category:main/oracle",
                create_ora,
                "category:drop",
                drop,
            ]),
            vec![
                Ok(categorized(Phase::Metainfo, None, "name=foo")),
                Ok(categorized(Phase::Main, Some("postgres"), create_pg)),
                Ok(categorized(Phase::Main, Some("oracle"), create_ora)),
                Ok(categorized(Phase::Drop, None, drop)),
            ]
        );
    }

    #[test]
    fn pairing_errors() {
        assert_eq!(
            categorize_strs(&["category:main", "CREATE TABLE a (x INT)", "CREATE TABLE b (x INT)"]),
            vec![
                Ok(categorized(Phase::Main, None, "CREATE TABLE a (x INT)")),
                Err(Error::Pairing(
                    r#"missing category tag before statement "CREATE TABLE b (x INT)""#.into()
                )),
            ]
        );
        assert_eq!(
            categorize_strs(&["category:main", "category:drop", "DROP TABLE a"]),
            vec![Err(Error::Pairing(
                r#"unexpected meta-statement "category:drop" after category:main, expected a statement"#
                    .into()
            ))]
        );
        assert_eq!(
            categorize_strs(&["category:main", "CREATE TABLE a (x INT)", "category:drop"]),
            vec![
                Ok(categorized(Phase::Main, None, "CREATE TABLE a (x INT)")),
                Err(Error::Pairing("meta-statement category:drop has no statement".into())),
            ]
        );
        // A statement with bind parameters is not mistaken for a meta-statement.
        assert_eq!(
            categorize_strs(&["SELECT a FROM t WHERE b = :b"]),
            vec![Err(Error::Pairing(
                r#"missing category tag before statement "SELECT a FROM t WHERE b = :b""#.into()
            ))]
        );
        // Invalid meta-statements are reported as such.
        assert_eq!(
            categorize_strs(&["category:final", "SELECT 1"]),
            vec![Err(Error::Meta(r#"invalid phase "final" in "category:final""#.into()))]
        );
    }

    #[test]
    fn input_errors() {
        let input = vec![Ok(RawStatement::from("category:main")), Err(Error::IO("boom".into()))];
        assert_eq!(categorize(input).collect::<Vec<_>>(), vec![Err(Error::IO("boom".into()))]);
    }

    #[test]
    fn applies_to() {
        assert!(categorized(Phase::Main, None, "x").applies_to("Oracle"));
        assert!(categorized(Phase::Main, Some("oracle"), "x").applies_to("Oracle"));
        assert!(!categorized(Phase::Main, Some("postgres"), "x").applies_to("Oracle"));
    }
}
