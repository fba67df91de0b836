//! Command-line interface for gitsql.

pub mod output;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::sql::{ConnectOptions, Connection, TABLES};

pub use output::OutputFormat;

const LONG_ABOUT: &str = r#"SQL driver for Git repository history.

Tables: commits, commit_parents, refs, files, blame  (run 'gitsql tables' for schemas)

QUICK START

  gitsql "SELECT short_id, summary FROM commits LIMIT 10"
  gitsql "SELECT author_name, COUNT(*) AS n FROM commits GROUP BY author_name ORDER BY n DESC"
  gitsql "SELECT * FROM blame('README.md')"

  gitsql tables            # Show table schemas
  gitsql -f json "..."     # Output as JSON
  gitsql --help            # More examples"#;

const EXAMPLES: &str = r#"SELECT short_id, summary FROM commits LIMIT 10
SELECT author_name, COUNT(*) AS commits FROM commits GROUP BY author_name ORDER BY commits DESC
SELECT c.short_id, COUNT(p.parent_id) AS parents FROM commits c JOIN commit_parents p ON p.commit_id = c.id GROUP BY c.id
SELECT name, kind, target_commit_id FROM refs WHERE kind = 'branch'
SELECT path, size FROM files WHERE commit_id = (SELECT id FROM commits LIMIT 1) ORDER BY size DESC LIMIT 20
SELECT commit_id, COUNT(*) AS lines FROM blame('src/main.rs') GROUP BY commit_id
SELECT commit_date(authored_at) AS day, COUNT(*) FROM commits GROUP BY day"#;

#[derive(Parser)]
#[command(name = "gitsql")]
#[command(version)]
#[command(about = "SQL driver for Git repository history", long_about = LONG_ABOUT)]
pub struct Args {
    /// SQL query to execute
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Path to the Git repository (or any directory inside it)
    #[arg(long, default_value = ".", conflicts_with = "url")]
    pub repo: PathBuf,

    /// Connection URL: gitsql://<path>[?ref=<name>][&depth=<n>]
    #[arg(long)]
    pub url: Option<String>,

    /// Default ref for unqualified scans (e.g. main, v1.0, a commit hash)
    #[arg(long = "ref")]
    pub reference: Option<String>,

    /// Bound ancestry walks to this many generations from the tips
    #[arg(long)]
    pub depth: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the available tables
    Tables,
    /// Show the columns of one table
    Schema {
        /// Table name
        table: String,
    },
    /// Show example queries
    Examples,
}

pub fn run(args: Args) -> Result<()> {
    match &args.command {
        Some(Command::Tables) => {
            print_tables();
            Ok(())
        }
        Some(Command::Schema { table }) => print_schema(table),
        Some(Command::Examples) => {
            println!("{EXAMPLES}");
            Ok(())
        }
        None => {
            let Some(query) = &args.query else {
                println!("{LONG_ABOUT}");
                return Ok(());
            };
            let connection = Connection::open_with(connect_options(&args)?)?;
            let result = connection.query(query)?;
            output::write_result(&mut io::stdout().lock(), &result, args.format)
        }
    }
}

fn connect_options(args: &Args) -> Result<ConnectOptions> {
    let mut options = match &args.url {
        Some(url) => ConnectOptions::parse(url)?,
        None => ConnectOptions::new(&args.repo),
    };
    if let Some(reference) = &args.reference {
        options.reference = Some(reference.clone());
    }
    if let Some(depth) = args.depth {
        options.depth = Some(depth);
    }
    Ok(options)
}

fn print_tables() {
    for table in TABLES {
        println!("{:<16} {}", table.name, table.description);
    }
}

fn print_schema(name: &str) -> Result<()> {
    let table = crate::sql::schema::require_table_info(name)?;
    println!("{} - {}", table.name, table.description);
    for column in table.columns {
        let hidden = if column.hidden { " (hidden parameter)" } else { "" };
        println!(
            "  {:<18} {:<8} {}{}",
            column.name, column.sql_type, column.description, hidden
        );
    }
    if !table.pushdown.is_empty() {
        println!("  pushdown: equality on {}", table.pushdown.join(", "));
    }
    Ok(())
}
