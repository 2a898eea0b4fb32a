//! geomhist CLI
//!
//! # Usage
//!
//! ```bash
//! # Load a full history extract into a SQLite store
//! geomhist ingest --input helsinki.osh --db history.sqlite
//!
//! # Count geometry modifications of selected features
//! geomhist analyze --db history.sqlite --ids-file ways.txt --output counts.jsonl
//!
//! # Recompute statistics from saved counts, export modified ids
//! geomhist stats --records counts.jsonl --modified-ids modified.txt
//!
//! # Print the stored history of one feature
//! geomhist show --db history.sqlite --id 4220138
//!
//! # Load a changeset dump, then attribute features to their reported sources
//! geomhist changesets --input changesets.osm --db history.sqlite
//! geomhist sources --db history.sqlite --ids-file modified.txt --output sources.jsonl
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use geomhist_core::features::attribution::write_attributions;
use geomhist_core::features::reporting::{
    read_feature_ids, read_records, write_feature_ids, write_records,
};
use geomhist_core::storage::{ChangesetStore, FeatureId, SqliteVersionStore, VersionStore};
use geomhist_core::{
    modified_feature_ids, GeomhistConfig, HistoryIngestor, ModificationSequencer,
    ModificationStats, OsmChangesetSource, OsmXmlSource, SourceAttributor, SourceSummary,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "geomhist")]
#[command(about = "Geometry modification analysis of OSM full-history extracts", long_about = None)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest an .osh history file into a version store
    Ingest {
        /// History file (OSM XML with all versions)
        #[arg(short, long)]
        input: PathBuf,

        /// SQLite store, created if missing
        #[arg(long)]
        db: PathBuf,

        /// YAML configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Count geometry modifications per feature
    #[command(group(ArgGroup::new("selection").required(true).args(["ids", "ids_file", "all"])))]
    Analyze {
        #[arg(long)]
        db: PathBuf,

        /// Feature id (repeatable)
        #[arg(long = "id")]
        ids: Vec<FeatureId>,

        /// File with one feature id per line
        #[arg(long)]
        ids_file: Option<PathBuf>,

        /// Every feature in the store
        #[arg(long)]
        all: bool,

        /// Write per-feature counts as JSON Lines
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// YAML configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Summarize previously saved counts
    Stats {
        /// JSON Lines written by `analyze --output`
        #[arg(long)]
        records: PathBuf,

        /// Write ids of modified features, one per line
        #[arg(long)]
        modified_ids: Option<PathBuf>,
    },

    /// Print all stored versions of a feature as JSON
    Show {
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        id: FeatureId,
    },

    /// Import a changeset dump into the store
    Changesets {
        /// Changeset dump (OSM XML of <changeset> elements)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        db: PathBuf,

        /// YAML configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Attribute features to the `source` tag of their changesets
    #[command(group(ArgGroup::new("selection").required(true).args(["ids", "ids_file", "all"])))]
    Sources {
        #[arg(long)]
        db: PathBuf,

        /// Feature id (repeatable)
        #[arg(long = "id")]
        ids: Vec<FeatureId>,

        /// File with one feature id per line
        #[arg(long)]
        ids_file: Option<PathBuf>,

        /// Every feature in the store
        #[arg(long)]
        all: bool,

        /// Attribute every version instead of the latest one
        #[arg(long)]
        history: bool,

        /// Write attributions as JSON Lines
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest { input, db, config } => ingest(&input, &db, config.as_deref()),
        Commands::Analyze {
            db,
            ids,
            ids_file,
            all,
            output,
            config,
        } => {
            let store = open_store(&db)?;
            let feature_ids = select_features(&store, ids, ids_file.as_deref(), all)?;
            analyze(&store, feature_ids, output.as_deref(), config.as_deref())
        }
        Commands::Stats {
            records,
            modified_ids,
        } => stats(&records, modified_ids.as_deref()),
        Commands::Show { db, id } => {
            let store = open_store(&db)?;
            let versions = store.versions_of(id)?;
            println!("{}", serde_json::to_string_pretty(&versions)?);
            Ok(())
        }
        Commands::Changesets { input, db, config } => changesets(&input, &db, config.as_deref()),
        Commands::Sources {
            db,
            ids,
            ids_file,
            all,
            history,
            output,
        } => {
            let store = open_store(&db)?;
            let feature_ids = select_features(&store, ids, ids_file.as_deref(), all)?;
            sources(&store, feature_ids, history, output.as_deref())
        }
    }
}

fn select_features(
    store: &SqliteVersionStore,
    ids: Vec<FeatureId>,
    ids_file: Option<&Path>,
    all: bool,
) -> Result<Vec<FeatureId>> {
    if all {
        return Ok(store.feature_ids()?);
    }
    match ids_file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            Ok(read_feature_ids(BufReader::new(file))?)
        }
        None => Ok(ids),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(db: &Path) -> Result<SqliteVersionStore> {
    SqliteVersionStore::open(db).with_context(|| format!("opening store {}", db.display()))
}

fn ingest(input: &Path, db: &Path, config: Option<&Path>) -> Result<()> {
    let mut config = GeomhistConfig::load(config)?;
    let store = open_store(db)?;

    // Continue numbering after whatever the store already holds
    let existing = store.stats()?;
    if existing.total_versions > 0 {
        info!(
            "Store already holds {} versions, continuing at sequence id {}",
            existing.total_versions,
            existing.next_sequence_id()
        );
        config.ingest.first_sequence_id = existing.next_sequence_id();
    }

    let source = OsmXmlSource::open(input).with_context(|| format!("opening {}", input.display()))?;
    let report = HistoryIngestor::new(config.ingest)
        .run(source, &store)
        .with_context(|| format!("ingesting {}", input.display()))?;

    println!(
        "Ingested {} versions in {:.1}s ({} duplicates discarded, {} integrity warnings)",
        report.versions_written,
        report.elapsed.as_secs_f64(),
        report.duplicates_discarded,
        report.warning_count
    );
    Ok(())
}

fn analyze(
    store: &SqliteVersionStore,
    feature_ids: Vec<FeatureId>,
    output: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    let config = GeomhistConfig::load(config)?;
    info!("Analysing {} features", feature_ids.len());

    let records = ModificationSequencer::new(store, config.detector).count_many(feature_ids)?;

    if let Some(path) = output {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_records(BufWriter::new(file), &records)?;
        info!("Wrote {} records to {}", records.len(), path.display());
    }

    println!("{}", ModificationStats::from_records(&records));
    Ok(())
}

fn stats(records_path: &Path, modified_ids: Option<&Path>) -> Result<()> {
    let file = File::open(records_path).with_context(|| format!("opening {}", records_path.display()))?;
    let records = read_records(BufReader::new(file))?;

    if let Some(path) = modified_ids {
        let ids = modified_feature_ids(&records);
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_feature_ids(BufWriter::new(file), &ids)?;
        info!("Wrote {} modified feature ids to {}", ids.len(), path.display());
    }

    println!("{}", ModificationStats::from_records(&records));
    Ok(())
}

fn changesets(input: &Path, db: &Path, config: Option<&Path>) -> Result<()> {
    let config = GeomhistConfig::load(config)?;
    let store = open_store(db)?;

    let source = OsmChangesetSource::open(input).with_context(|| format!("opening {}", input.display()))?;
    let report = HistoryIngestor::new(config.ingest)
        .import_changesets(source, &store)
        .with_context(|| format!("importing {}", input.display()))?;

    println!(
        "Imported {} changesets in {:.1}s ({} with a source tag, {} stored in total)",
        report.changesets_written,
        report.elapsed.as_secs_f64(),
        report.with_source,
        store.changeset_count()?
    );
    Ok(())
}

fn sources(
    store: &SqliteVersionStore,
    feature_ids: Vec<FeatureId>,
    history: bool,
    output: Option<&Path>,
) -> Result<()> {
    let attributor = SourceAttributor::new(store);
    let attributions = if history {
        let mut all = Vec::new();
        for feature_id in feature_ids {
            all.extend(attributor.history(feature_id)?);
        }
        all
    } else {
        attributor.latest_many(feature_ids)?
    };

    if let Some(path) = output {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_attributions(BufWriter::new(file), &attributions)?;
        info!("Wrote {} attributions to {}", attributions.len(), path.display());
    }

    println!("{}", SourceSummary::from_attributions(&attributions));
    Ok(())
}
