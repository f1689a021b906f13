//! `bindery`: manage an e-book library through `calibredb` or directly.

use bindery_library::{AggregatedBook, BackendKind, BookQuery, BookRecord, Filter, Library, Projection};
use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use exn::{OptionExt, ResultExt};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, exn::Exn<ErrorKind>>;

#[derive(Debug, Display, Error)]
enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("no library given: pass --library or set `library` in the configuration")]
    NoLibrary,
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
    #[display("library operation failed")]
    Library,
    #[display("could not write output")]
    Output,
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Library folder (holds `metadata.db`)
    #[arg(long, short, global = true)]
    library: Option<PathBuf>,
    /// `catalog` (direct SQLite access) or `calibredb`
    #[arg(long, short, global = true, value_parser = parse_backend)]
    backend: Option<BackendKind>,
    /// Configuration file (toml, yaml or json)
    #[arg(long, global = true, env = "BINDERY_CONFIG")]
    config: Option<PathBuf>,
    /// More logging (-v info, -vv debug, -vvv trace); `RUST_LOG` wins
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty library
    New,
    /// Copy the library to a new folder
    Clone { destination: PathBuf },
    /// Add e-book files
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove books by id
    Remove {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<i64>,
    },
    /// List books as JSON
    List {
        /// Comma-separated fields, e.g. `authors,series,formats`
        #[arg(long, short)]
        fields: Option<String>,
        /// Only the book with this id (repeatable)
        #[arg(long)]
        id: Vec<i64>,
        /// `field=value` equality filter (repeatable, combined with AND)
        #[arg(long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Aggregate from the explicit catalog rows instead of the `meta` view
        #[arg(long, conflicts_with_all = ["fields", "id", "filters", "limit"])]
        structured: bool,
    },
    /// List author names
    Authors,
    /// Report books whose add was interrupted
    Check,
    /// Remove books whose add was interrupted
    Repair,
}

fn parse_backend(s: &str) -> std::result::Result<BackendKind, String> {
    s.parse().map_err(|_| format!("unknown backend `{s}` (expected `catalog` or `calibredb`)"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = bindery_config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let path = cli.library.or(config.library.clone()).ok_or_raise(|| ErrorKind::NoLibrary)?;
    let kind = cli.backend.unwrap_or(config.backend);
    let options = config.library_options();

    if let Commands::New = cli.command {
        let library = Library::new_empty_with(&path, kind, options).or_raise(|| ErrorKind::Library)?;
        return print(&library.root());
    }
    let library = Library::open_with(&path, kind, options).or_raise(|| ErrorKind::Library)?;
    match cli.command {
        Commands::New => Ok(()),
        Commands::Clone { destination } => {
            let clone = library.clone_to(&destination).or_raise(|| ErrorKind::Library)?;
            print(&clone.root())
        },
        Commands::Add { files } => print(&library.add_books(&files).or_raise(|| ErrorKind::Library)?),
        Commands::Remove { ids } => library.remove_by_ids(&ids).or_raise(|| ErrorKind::Library),
        Commands::List { fields, id, filters, limit, structured } => {
            let books = match structured {
                true => {
                    let books = library.list_books_structured().or_raise(|| ErrorKind::Library)?;
                    books.iter().map(AggregatedBook::to_record).collect::<Vec<BookRecord>>()
                },
                false => library.list_books(&query(fields, id, filters, limit)?).or_raise(|| ErrorKind::Library)?,
            };
            print(&books)
        },
        Commands::Authors => print(&library.list_authors().or_raise(|| ErrorKind::Library)?),
        Commands::Check => print(&library.incomplete_books().or_raise(|| ErrorKind::Library)?),
        Commands::Repair => print(&library.repair().or_raise(|| ErrorKind::Library)?),
    }
}

fn query(fields: Option<String>, ids: Vec<i64>, filters: Vec<String>, limit: Option<usize>) -> Result<BookQuery> {
    let projection = match fields {
        Some(fields) => Projection::parse(&fields).or_raise(|| ErrorKind::InvalidArgument(fields.clone()))?,
        None => Projection::all(),
    };
    let mut query = BookQuery::new(projection).limit(limit);
    for id in ids {
        query = query.filter(Filter::id(id));
    }
    for filter in filters {
        query = query.filter(filter.parse().or_raise(|| ErrorKind::InvalidArgument(filter.clone()))?);
    }
    Ok(query)
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).or_raise(|| ErrorKind::Output)?;
    writeln!(stdout).or_raise(|| ErrorKind::Output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_library::Field;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["bindery", "-l", "/lib", "list", "--fields", "authors", "--id", "2"])]
    #[case(&["bindery", "list", "--library", "/lib", "--backend", "calibredb", "--structured"])]
    #[case(&["bindery", "remove", "1,2", "3"])]
    fn test_parses(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[rstest]
    #[case(&["bindery", "--backend", "postgres", "authors"])]
    #[case(&["bindery", "list", "--structured", "--id", "2"])]
    #[case(&["bindery", "add"])]
    fn test_rejects(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_remove_ids_are_split() {
        let cli = Cli::try_parse_from(["bindery", "remove", "1,2", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Remove { ids } if ids == vec![1, 2, 3]));
    }

    #[test]
    fn test_query() {
        let query = query(Some("authors,series".into()), vec![2], vec!["title=Wool".into()], Some(5)).unwrap();
        assert_eq!(query.projection.fields(), &[Field::Authors, Field::Series]);
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.limit, Some(5));
        assert!(super::query(Some("languages".into()), vec![], vec![], None).is_err());
        assert!(super::query(None, vec![], vec!["cover=x".into()], None).is_err());
    }
}
