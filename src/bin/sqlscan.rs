//! sqlscan tokenizes Cerebrum SQL from a file or stdin and prints the tokens,
//! one per line. After each statement terminator it prints the statement's
//! tokens as => text, and finally any tokens following the last terminator.
//! Useful for debugging the scanner and for auditing statements.

#![warn(clippy::all)]

use std::io::Write as _;
use std::path::PathBuf;

use clap::Parser as _;
use itertools::Itertools as _;

use cerebrum_sql::encoding::Encoding;
use cerebrum_sql::error::Result;
use cerebrum_sql::sql::{Scanner, Token, TokenKind};

fn main() {
    if let Err(error) = Command::parse().run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

/// The sqlscan command.
#[derive(clap::Parser)]
#[command(about = "Tokenizes Cerebrum SQL.", version, propagate_version = true)]
struct Command {
    /// The file to scan. Reads stdin if not given.
    file: Option<PathBuf>,
    /// The input encoding (utf8 or latin1).
    #[arg(short, long, default_value = "utf8")]
    encoding: Encoding,
}

impl Command {
    /// Runs the command.
    fn run(self) -> Result<()> {
        let scanner = match &self.file {
            Some(path) => Scanner::from_reader(std::fs::File::open(path)?, self.encoding)?,
            None => Scanner::from_reader(std::io::stdin().lock(), self.encoding)?,
        };
        let mut stdout = std::io::stdout().lock();
        let mut statement: Vec<Token> = Vec::new();
        for token in scanner {
            let token = token?;
            writeln!(stdout, "{token}")?;
            if token.kind == TokenKind::EndOfStatement {
                writeln!(stdout, "=> {}", statement.iter().map(|t| &t.text).join(" "))?;
                statement.clear();
            } else {
                statement.push(token);
            }
        }
        if !statement.is_empty() {
            writeln!(stdout, "trailing: {}", statement.iter().map(|t| &t.text).join(" "))?;
        }
        Ok(())
    }
}
