use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use log::{debug, trace};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;
use crate::errlex;
use crate::error::{Error, Result};

/// Runs of whitespace, collapsed to a single space.
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("invalid regex"));

/// A block comment opened and closed on the same line.
static COMMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/\*.*\*/$").expect("invalid regex"));

/// A line closing a block comment.
static COMMENT_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*/$").expect("invalid regex"));

/// A line opening a block comment.
static COMMENT_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/\*").expect("invalid regex"));

/// A line that opens a function definition. Matches FUNCTION as a whole word
/// only, so e.g. my_function() doesn't open one.
static FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFUNCTION\b").expect("invalid regex"));

/// A DROP FUNCTION statement, which has no body.
static DROP_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bDROP\s+FUNCTION\b").expect("invalid regex"));

/// A line that closes a function definition. Matches LANGUAGE as a whole word
/// only.
static LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLANGUAGE\b").expect("invalid regex"));

/// A statement or meta-statement from a design file, with comments removed,
/// whitespace collapsed to single spaces and the terminator stripped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatement {
    /// The 1-based source line where the statement starts, or 0 if unknown.
    pub line: usize,
    pub text: String,
}

impl RawStatement {
    /// Describes the statement for error messages.
    pub(super) fn describe(&self) -> String {
        match self.line {
            0 => format!("{:?}", self.text),
            line => format!("{:?} at line {line}", self.text),
        }
    }
}

impl From<&str> for RawStatement {
    fn from(text: &str) -> Self {
        Self { line: 0, text: text.to_string() }
    }
}

impl From<String> for RawStatement {
    fn from(text: String) -> Self {
        Self { line: 0, text }
    }
}

impl std::fmt::Display for RawStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Line parser state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Plain SQL: a ; at the end of a line ends the statement.
    Normal,
    /// Inside a function definition, whose body may contain ; terminators.
    /// The statement ends at the line containing LANGUAGE.
    InFunctionBody,
    /// Inside a block comment. Returns to the function body afterwards if the
    /// comment was opened there.
    InBlockComment { in_function: bool },
}

/// What to do with a line.
#[derive(Debug, PartialEq, Eq)]
enum Action<'a> {
    /// Drop the line.
    Skip,
    /// Append the line to the statement buffer.
    Append(&'a str),
    /// Append the line to the statement buffer and emit the statement.
    Flush(&'a str),
}

/// The line parser's transition function. Takes the current state, a
/// whitespace-collapsed, trimmed line, and whether the buffered statement ends
/// inside an open string literal. Returns the next state and what to do with
/// the line.
///
/// Block comments must start and end on lines of their own. Comment lines are
/// dropped in all states, including inside function bodies, and a FUNCTION
/// line inside a block comment is just a comment. Function body lines are
/// buffered verbatim: only whole-line -- comments are dropped there, since
/// bodies are usually string literals themselves.
fn transition(state: State, line: &str, quoted: bool) -> (State, Action<'_>) {
    if line.is_empty() {
        return (state, Action::Skip);
    }
    let in_function = match state {
        State::InBlockComment { in_function } => {
            if COMMENT_CLOSE.is_match(line) {
                let resume = if in_function { State::InFunctionBody } else { State::Normal };
                return (resume, Action::Skip);
            }
            return (state, Action::Skip);
        }
        State::Normal => false,
        State::InFunctionBody => true,
    };
    if COMMENT_LINE.is_match(line) || COMMENT_CLOSE.is_match(line) {
        return (state, Action::Skip);
    }
    if COMMENT_OPEN.is_match(line) {
        return (State::InBlockComment { in_function }, Action::Skip);
    }
    if in_function {
        if line.starts_with("--") {
            return (state, Action::Skip);
        }
        if LANGUAGE.is_match(line) {
            return (State::Normal, Action::Flush(strip_terminator(line)));
        }
        return (State::InFunctionBody, Action::Append(line));
    }

    let line = strip_line_comment(line, quoted);
    if line.is_empty() {
        return (state, Action::Skip);
    }
    if FUNCTION.is_match(line) && !DROP_FUNCTION.is_match(line) {
        if LANGUAGE.is_match(line) {
            return (State::Normal, Action::Flush(strip_terminator(line)));
        }
        return (State::InFunctionBody, Action::Append(line));
    }
    if line.ends_with(';') {
        return (State::Normal, Action::Flush(strip_terminator(line)));
    }
    (State::Normal, Action::Append(line))
}

/// Removes a -- comment from a line, unless it's inside a string literal.
/// The line starts inside a string literal if quoted is true.
fn strip_line_comment(line: &str, quoted: bool) -> &str {
    let mut in_string = quoted;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => in_string = !in_string,
            '-' if !in_string && chars.peek().is_some_and(|(_, c)| *c == '-') => {
                return line[..i].trim_end();
            }
            _ => {}
        }
    }
    line
}

/// Returns whether a string literal is open after the text, given whether one
/// was open before it. Doubled '' escapes toggle twice.
fn ends_quoted(text: &str, quoted: bool) -> bool {
    let quotes = text.chars().filter(|c| *c == '\'').count();
    quoted ^ (quotes % 2 == 1)
}

/// Strips a trailing ; statement terminator.
fn strip_terminator(line: &str) -> &str {
    line.strip_suffix(';').unwrap_or(line).trim_end()
}

/// Opens a design file and returns an iterator over its statements and
/// meta-statements, in file order. The file is closed when the iterator is
/// dropped.
pub fn parse_sql_file(path: impl AsRef<Path>, encoding: Encoding) -> Result<Statements<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| Error::IO(format!("{}: {err}", path.display())))?;
    debug!("Parsing {} as {encoding}", path.display());
    Ok(Statements::new(BufReader::new(file), encoding))
}

/// An iterator over the statements and meta-statements of a design file,
/// reading one line at a time. A statement is the text up to a line ending
/// with ;, except for function definitions, which run up to the line
/// containing LANGUAGE since their bodies contain ; terminators.
///
/// The iterator yields no further items after an error.
pub struct Statements<R: BufRead> {
    lines: std::io::Split<R>,
    encoding: Encoding,
    state: State,
    /// The statement buffer, lines joined by single spaces.
    buffer: String,
    /// The line number where the buffered statement starts.
    start: usize,
    /// Whether the buffered statement ends inside an open string literal.
    quoted: bool,
    /// The current line number.
    line: usize,
    done: bool,
}

impl<R: BufRead> Statements<R> {
    /// Creates a statement iterator over a reader.
    pub fn new(reader: R, encoding: Encoding) -> Self {
        Self {
            lines: reader.split(b'\n'),
            encoding,
            state: State::Normal,
            buffer: String::new(),
            start: 0,
            quoted: false,
            line: 0,
            done: false,
        }
    }

    /// Reads lines until a statement is complete.
    fn read_statement(&mut self) -> Result<Option<RawStatement>> {
        while let Some(bytes) = self.lines.next().transpose()? {
            self.line += 1;
            let raw = match self.encoding.decode(bytes) {
                Ok(raw) => raw,
                Err(Error::InvalidInput(msg)) => {
                    return Err(Error::InvalidInput(format!("line {}: {msg}", self.line)));
                }
                Err(err) => return Err(err),
            };
            let line = WHITESPACE.replace_all(&raw, " ");
            let (state, action) = transition(self.state, line.trim(), self.quoted);
            if state != self.state {
                debug!("Line {}: {:?} → {:?}", self.line, self.state, state);
                self.state = state;
            }
            match action {
                Action::Skip => {}
                Action::Append(text) => self.append(text),
                Action::Flush(text) => {
                    self.append(text);
                    if let Some(statement) = self.flush() {
                        return Ok(Some(statement));
                    }
                }
            }
        }

        // End of input. A trailing statement without terminator (or an
        // unterminated function definition) is emitted as is.
        if let State::InBlockComment { .. } = self.state {
            return errlex!("unterminated block comment at end of input (line {})", self.line);
        }
        Ok(self.flush())
    }

    /// Appends text to the statement buffer.
    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.buffer.is_empty() {
            self.start = self.line;
        } else {
            self.buffer.push(' ');
        }
        self.buffer.push_str(text);
        self.quoted = ends_quoted(text, self.quoted);
    }

    /// Takes the buffered statement, if any.
    fn flush(&mut self) -> Option<RawStatement> {
        self.quoted = false;
        let text = std::mem::take(&mut self.buffer).trim().to_string();
        if text.is_empty() {
            return None;
        }
        trace!("Statement at line {}: {text}", self.start);
        Some(RawStatement { line: self.start, text })
    }
}

impl<R: BufRead> Iterator for Statements<R> {
    type Item = Result<RawStatement>;

    fn next(&mut self) -> Option<Result<RawStatement>> {
        if self.done {
            return None;
        }
        let result = self.read_statement().transpose();
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

    /// The example design file: comments, metainfo, a table, and a function.
    const EXAMPLE: &str = "/* Example design file,
   spanning two lines. */
-- A line comment.
category:metainfo;
name=foo;

category:pre;
CREATE TABLE IF NOT EXISTS example_t (value TEXT NOT NULL);
drop table IF EXISTS example_t;
CREATE FUNCTION example_f() RETURNS trigger AS $$
  BEGIN
    NEW.value := lower(NEW.value);
    RETURN NEW;
  END;
$$ LANGUAGE plpgsql;
";

    /// Parses the input into statement texts, panicking on errors.
    fn parse(input: &str) -> Vec<String> {
        Statements::new(input.as_bytes(), Encoding::Utf8)
            .map(|r| r.map(|s| s.text))
            .collect::<Result<_>>()
            .expect("parse failed")
    }

    #[test]
    fn example() {
        let statements = parse(EXAMPLE);
        assert_eq!(statements.len(), 6);
        assert_eq!(statements[0], "category:metainfo");
        assert_eq!(statements[1], "name=foo");
        assert_eq!(statements[2], "category:pre");
        assert_eq!(statements[3], "CREATE TABLE IF NOT EXISTS example_t (value TEXT NOT NULL)");
        assert!(statements[4].starts_with("drop table"));
        assert_eq!(
            statements[5],
            "CREATE FUNCTION example_f() RETURNS trigger AS $$ BEGIN NEW.value := lower(NEW.value); \
             RETURN NEW; END; $$ LANGUAGE plpgsql"
        );
    }

    #[test]
    fn line_numbers() -> Result<()> {
        let lines: Vec<usize> = Statements::new(EXAMPLE.as_bytes(), Encoding::Utf8)
            .map(|r| r.map(|s| s.line))
            .collect::<Result<_>>()?;
        assert_eq!(lines, vec![4, 5, 7, 8, 9, 10]);
        Ok(())
    }

    /// Extra blank lines and spaces don't change the statements.
    #[test]
    fn whitespace_fixed_point() {
        let spaced: String = EXAMPLE
            .lines()
            .map(|line| format!("\n  {}\t ", line.replace(' ', "   ")))
            .collect();
        assert_eq!(parse(&spaced), parse(EXAMPLE));
    }

    #[test]
    fn multiline_statement() {
        assert_eq!(
            parse("CREATE TABLE t\n(\n  a INT, -- the a\n  b TEXT\n)\n;\nSELECT 1;"),
            vec!["CREATE TABLE t ( a INT, b TEXT )", "SELECT 1"]
        );
    }

    #[test]
    fn line_comments() {
        assert_eq!(
            parse("-- header\nSELECT '--not a comment' FROM t; -- trailing\n  -- indented"),
            vec!["SELECT '--not a comment' FROM t"]
        );
    }

    #[test]
    fn block_comments() {
        assert_eq!(
            parse("/* one line */\n/*\nCREATE FUNCTION f() ...;\nSELECT 1;\n*/\nSELECT 2;"),
            vec!["SELECT 2"]
        );
        // A comment inside a function body is dropped, and the body continues.
        assert_eq!(
            parse("CREATE FUNCTION f() AS '\n/*\n x; \n*/\nBEGIN x; END;\n' LANGUAGE plpgsql;"),
            vec!["CREATE FUNCTION f() AS ' BEGIN x; END; ' LANGUAGE plpgsql"]
        );
        // Stray closing lines are dropped.
        assert_eq!(parse("*/\nSELECT 1;"), vec!["SELECT 1"]);
    }

    #[test]
    fn functions() {
        // DROP FUNCTION has no body.
        assert_eq!(
            parse("DROP FUNCTION f();\nSELECT 1;"),
            vec!["DROP FUNCTION f()", "SELECT 1"]
        );
        // A definition on a single line.
        assert_eq!(
            parse("CREATE FUNCTION f() RETURNS int AS 'SELECT 1;' LANGUAGE sql;\nSELECT 2;"),
            vec!["CREATE FUNCTION f() RETURNS int AS 'SELECT 1;' LANGUAGE sql", "SELECT 2"]
        );
        // Function names containing "function" don't start a definition.
        assert_eq!(parse("SELECT my_function(1);\nSELECT 2;"), vec!["SELECT my_function(1)", "SELECT 2"]);
    }

    #[test]
    fn unterminated() {
        // A trailing statement without terminator is emitted at the end.
        assert_eq!(parse("SELECT 1;\nSELECT 2"), vec!["SELECT 1", "SELECT 2"]);
        // A lone terminator is not a statement.
        assert_eq!(parse(";\nSELECT 1;"), vec!["SELECT 1"]);

        let mut statements = Statements::new("SELECT 1;\n/*\nSELECT 2;".as_bytes(), Encoding::Utf8);
        assert_eq!(statements.next(), Some(Ok(RawStatement { line: 1, text: "SELECT 1".into() })));
        assert_eq!(
            statements.next(),
            Some(Err(Error::Lex("unterminated block comment at end of input (line 3)".into())))
        );
        assert_eq!(statements.next(), None);
    }

    #[test]
    fn latin1() -> Result<()> {
        let input = b"INSERT INTO t VALUES ('Troms\xf8');\n";
        let statements: Vec<RawStatement> = Statements::new(&input[..], Encoding::Latin1).collect::<Result<_>>()?;
        assert_eq!(statements, vec![RawStatement { line: 1, text: "INSERT INTO t VALUES ('Tromsø')".into() }]);

        let mut statements = Statements::new(&input[..], Encoding::Utf8);
        assert!(matches!(statements.next(), Some(Err(Error::InvalidInput(_)))));
        Ok(())
    }

    #[test]
    fn function_body_verbatim() {
        assert_eq!(
            parse(
                "CREATE FUNCTION f() RETURNS text AS '\nBEGIN\n  -- checks\n  RAISE EXCEPTION ''bad -- input'';\n  \
                 RETURN ''--'';\nEND;\n' LANGUAGE plpgsql;"
            ),
            vec![
                "CREATE FUNCTION f() RETURNS text AS ' BEGIN RAISE EXCEPTION ''bad -- input''; \
                 RETURN ''--''; END; ' LANGUAGE plpgsql"
            ]
        );
    }

    /// A -- inside a string literal spanning lines is not a comment.
    #[test]
    fn multiline_string() {
        assert_eq!(
            parse("INSERT INTO t VALUES ('a\n-- b\nc -- d'); -- e\nSELECT 1;"),
            vec!["INSERT INTO t VALUES ('a -- b c -- d')", "SELECT 1"]
        );
        assert!(ends_quoted("x = 'a", false));
        assert!(!ends_quoted("x = 'it''s'", false));
        assert!(!ends_quoted("b'", true));
    }

    #[test]
    fn transitions() {
        use Action::*;
        use State::*;
        let cases = [
            (Normal, "", Normal, Skip),
            (Normal, "/* x */", Normal, Skip),
            (Normal, "/* x", InBlockComment { in_function: false }, Skip),
            (InBlockComment { in_function: false }, "CREATE FUNCTION f()", InBlockComment { in_function: false }, Skip),
            (InBlockComment { in_function: true }, "x */", InFunctionBody, Skip),
            (Normal, "-- x", Normal, Skip),
            (Normal, "create or replace function f()", InFunctionBody, Append("create or replace function f()")),
            (InFunctionBody, "x := 1;", InFunctionBody, Append("x := 1;")),
            (InFunctionBody, "x := ''a -- b'';", InFunctionBody, Append("x := ''a -- b'';")),
            (InFunctionBody, "-- x", InFunctionBody, Skip),
            (InFunctionBody, "' language 'plpgsql';", Normal, Flush("' language 'plpgsql'")),
            (Normal, "SELECT 1 ;", Normal, Flush("SELECT 1")),
            (Normal, "SELECT 1", Normal, Append("SELECT 1")),
        ];
        for (state, line, expect_state, expect_action) in cases {
            assert_eq!(transition(state, line, false), (expect_state, expect_action), "{state:?} {line:?}");
        }
    }
}
