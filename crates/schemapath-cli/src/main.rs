//! Schemapath CLI
//!
//! - Preview the attribute paths a schema document yields (`paths`)
//! - Derive a schema and persist it into a JSON snapshot store (`parse`)

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use schemapath_ingest::{DerivedPaths, ParseOptions, ParserConfig, SchemaParser, SourceFormat};
use schemapath_model::{display_path_key, path_key};
use schemapath_storage::MemoryStore;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "schemapath")]
#[command(
    author,
    version,
    about = "Derive attribute paths from JSON Schema, XSD and Solr schema documents"
)]
struct Cli {
    /// More log output (repeatable: -v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Parser configuration (JSON); defaults apply to absent fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Make the record tag the first segment of every path
    #[arg(long, global = true)]
    include_record_tag: bool,
    /// Namespace for terms minted without schema identity or base URI
    #[arg(long, global = true)]
    default_namespace: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the attribute paths of a schema document without storing anything.
    Paths {
        #[command(flatten)]
        source: SourceArgs,
        /// Emit JSON instead of one path per line
        #[arg(long)]
        json: bool,
    },

    /// Derive a schema and save it into a snapshot store.
    ///
    /// The store file is created if missing. The resulting schema is printed
    /// as JSON on stdout.
    Parse {
        #[command(flatten)]
        source: SourceArgs,
        /// Snapshot store (JSON)
        #[arg(long)]
        store: PathBuf,
        /// Schema name
        #[arg(long)]
        name: Option<String>,
        /// Reuse the attribute-path instances of this stored schema
        #[arg(long, value_name = "SCHEMA_UUID")]
        reuse_from: Option<String>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Schema document (JSON Schema, XSD or Solr schema.xml)
    source: PathBuf,
    /// Source format: json | xsd | solr
    #[arg(short, long)]
    format: SourceFormat,
    /// Only derive paths below nodes whose name ends with this tag
    #[arg(long)]
    record_tag: Option<String>,
    #[arg(long)]
    schema_uuid: Option<String>,
    /// Namespace for minted attribute URIs
    #[arg(long)]
    base_uri: Option<String>,
    /// Drop paths starting with this prefix (attribute URIs joined by " / ")
    #[arg(long = "exclude", value_name = "PATH")]
    excluded: Vec<String>,
}

impl SourceArgs {
    fn options(&self) -> ParseOptions {
        ParseOptions {
            record_tag: self.record_tag.clone(),
            schema_uuid: self.schema_uuid.clone(),
            schema_name: None,
            base_uri: self.base_uri.clone(),
            existing_path_identities: None,
            excluded_path_prefixes: self.excluded.iter().map(|p| parse_path_arg(p)).collect(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Paths { source, json } => cmd_paths(config, &source, json),
        Commands::Parse {
            source,
            store,
            name,
            reuse_from,
        } => cmd_parse(config, &source, &store, name, reuse_from.as_deref()),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<ParserConfig> {
    let mut config = match &cli.config {
        Some(path) => ParserConfig::from_path(path)
            .with_context(|| format!("loading parser config {}", path.display()))?,
        None => ParserConfig::default(),
    };
    if cli.include_record_tag {
        config.include_record_tag = true;
    }
    if let Some(namespace) = &cli.default_namespace {
        config.default_namespace = namespace.clone();
    }
    Ok(config)
}

/// `a / b / c` (as printed by `paths`) → canonical path string.
fn parse_path_arg(arg: &str) -> String {
    path_key(arg.split(" / ").map(str::trim).filter(|s| !s.is_empty()))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_paths(config: ParserConfig, args: &SourceArgs, json: bool) -> Result<()> {
    let parser = SchemaParser::new(args.format, config);
    let Some(paths) = parser
        .parse_attribute_paths_map(&args.source, &args.options())
        .with_context(|| format!("deriving paths from {}", args.source.display()))?
    else {
        eprintln!(
            "{} no record found in {}",
            "info:".yellow().bold(),
            args.source.display()
        );
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else {
        print_paths(&paths);
    }
    eprintln!(
        "{} {} attribute paths from {}",
        "ok".green().bold(),
        paths.len(),
        args.source.display()
    );
    Ok(())
}

fn print_paths(paths: &DerivedPaths) {
    for path in paths {
        let marker = if path.multivalue() == Some(true) { "  [*]" } else { "" };
        println!("{}{}", display_path_key(path.key()), marker);
    }
}

fn cmd_parse(
    config: ParserConfig,
    args: &SourceArgs,
    store_path: &Path,
    name: Option<String>,
    reuse_from: Option<&str>,
) -> Result<()> {
    let mut store = MemoryStore::open(store_path)
        .with_context(|| format!("opening store {}", store_path.display()))?;

    let mut options = args.options();
    options.schema_name = name;
    if let Some(existing) = reuse_from {
        let identities = store
            .attribute_path_identities(existing)
            .with_context(|| format!("collecting attribute paths of schema {existing}"))?;
        tracing::info!(schema = %existing, paths = identities.len(), "reusing attribute path instances");
        options.existing_path_identities = Some(identities);
    }

    let parser = SchemaParser::new(args.format, config);
    let schema = parser
        .parse(&args.source, &options, &mut store)
        .with_context(|| format!("parsing {}", args.source.display()))?
        .ok_or_else(|| anyhow!("no record found in {}", args.source.display()))?;

    store
        .save(store_path)
        .with_context(|| format!("saving store {}", store_path.display()))?;

    println!("{}", serde_json::to_string_pretty(&schema)?);
    eprintln!(
        "{} schema {} ({} attribute paths) → {}",
        "wrote".green().bold(),
        schema.uuid,
        schema.attribute_paths.len(),
        store_path.display().to_string().bold()
    );
    Ok(())
}
