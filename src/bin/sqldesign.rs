//! sqldesign preprocesses a Cerebrum design SQL file: it strips comments,
//! splits the file into statements, pairs each statement with its
//! meta-statement, and prints the statements of the selected phases (and
//! RDBMS) grouped under -- category:phase[/rdbms] header comments. Metainfo
//! statements are printed as -- key = value comments.
//!
//! Settings are read from an optional YAML config file and CEREBRUM_SQL_*
//! environment variables, and can be overridden on the command line.

#![warn(clippy::all)]

use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::PathBuf;

use clap::Parser as _;
use log::info;
use serde::Deserialize;

use cerebrum_sql::design::{MetaStatement, Phase, categorize, parse_metainfo, parse_sql_file};
use cerebrum_sql::encoding::Encoding;
use cerebrum_sql::error::Result;

fn main() {
    if let Err(error) = Command::parse().run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

/// The sqldesign command.
#[derive(clap::Parser)]
#[command(about = "Preprocesses a Cerebrum design SQL file.", version, propagate_version = true)]
struct Command {
    /// The design file to process.
    file: PathBuf,
    /// Phases to print (all if not given). Can be repeated.
    #[arg(short, long = "phase", value_name = "PHASE")]
    phases: Vec<Phase>,
    /// Only print statements for this RDBMS, and statements that are not
    /// RDBMS-specific.
    #[arg(short, long)]
    rdbms: Option<String>,
    /// The design file encoding (utf8 or latin1).
    #[arg(short, long)]
    encoding: Option<Encoding>,
    /// The configuration file path.
    #[arg(short = 'c', long, default_value = "/etc/cerebrum/sqldesign.yaml")]
    config: String,
}

impl Command {
    /// Runs the command.
    fn run(self) -> Result<()> {
        let cfg = Config::new(&self.config)?;
        init_logger(&cfg.log_level)?;

        let encoding = self.encoding.unwrap_or(cfg.encoding);
        let phases: BTreeSet<Phase> =
            if self.phases.is_empty() { cfg.phases } else { self.phases }.into_iter().collect();
        let rdbms = self.rdbms.or(cfg.rdbms);
        info!("Processing {} ({encoding})", self.file.display());

        let mut stdout = std::io::stdout().lock();
        let mut current: Option<MetaStatement> = None;
        let mut count = 0;
        for statement in categorize(parse_sql_file(&self.file, encoding)?) {
            let statement = statement?;
            if !phases.is_empty() && !phases.contains(&statement.phase) {
                continue;
            }
            if rdbms.as_deref().is_some_and(|rdbms| !statement.applies_to(rdbms)) {
                continue;
            }
            let meta = statement.meta();
            if current.as_ref() != Some(&meta) {
                writeln!(stdout, "-- {meta}")?;
                current = Some(meta);
            }
            match statement.phase {
                Phase::Metainfo => {
                    let (key, value) = parse_metainfo(&statement.statement)?;
                    writeln!(stdout, "-- {key} = {value}")?;
                }
                _ => writeln!(stdout, "{};", statement.statement)?,
            }
            count += 1;
        }
        info!("Printed {count} statements");
        Ok(())
    }
}

/// sqldesign configuration.
#[derive(Debug, Deserialize)]
struct Config {
    log_level: String,
    encoding: Encoding,
    phases: Vec<Phase>,
    #[serde(default)]
    rdbms: Option<String>,
}

impl Config {
    /// Loads the configuration from the given file, if it exists, and
    /// CEREBRUM_SQL_* environment variables.
    fn new(file: &str) -> Result<Self> {
        Ok(config::Config::builder()
            .set_default("log_level", "warn")?
            .set_default("encoding", "utf8")?
            .set_default("phases", Vec::<String>::new())?
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("CEREBRUM_SQL")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("phases"),
            )
            .build()?
            .try_deserialize()?)
    }
}

/// Sets up logging to stderr, leaving stdout to the output.
fn init_logger(level: &str) -> Result<()> {
    let level = level.parse::<simplelog::LevelFilter>()?;
    let mut config = simplelog::ConfigBuilder::new();
    if level != simplelog::LevelFilter::Debug {
        config.add_filter_allow_str("cerebrum_sql");
    }
    simplelog::TermLogger::init(
        level,
        config.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    )?;
    Ok(())
}
