//! SafeTwin CLI: schema catalog, adapter ingestion and signal monitoring.
//!
//! Usage:
//!   safetwin dimensions
//!   safetwin schema <dimension>
//!   safetwin ingest --spec adapter.yaml --data dir/ --credential api_key=... [--db path] [--twin id]
//!   safetwin monitor --signals signals.json [--config safetwin.yaml] [--decision halt]
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use safetwin::adapter::{Credentials, Filters, JsonDirSource};
use safetwin::workflow::{
    ActionDispatcher, RuleBasedRecommender, ScriptedSignals, SignalSnapshot,
};
use safetwin::{
    AdapterSpec, Config, Dimension, GraphStore, HumanDecision, IngestionManager, MappedAdapter,
    MemoryGraphStore, Normalizer, OpenStore, SchemaRegistry, SessionState, SessionStatus,
    SqliteGraphStore, TwinStore, WorkflowEngine,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "safetwin",
    version,
    about = "HSE knowledge graph ingestion and safety monitoring"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the canonical dimensions
    Dimensions,
    /// Show one dimension's schema
    Schema {
        /// Dimension identifier, e.g. risks_opportunities
        dimension: String,
    },
    /// Ingest a platform's records through a declarative adapter
    Ingest {
        /// Adapter spec (YAML)
        #[arg(long)]
        spec: PathBuf,
        /// Directory holding one <dimension>.json file per dimension
        #[arg(long)]
        data: PathBuf,
        /// Credential as key=value; repeatable
        #[arg(long = "credential", value_parser = parse_key_val)]
        credentials: Vec<(String, String)>,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Update this twin with the ingested entities
        #[arg(long)]
        twin: Option<String>,
    },
    /// Run one monitoring session over recorded signals
    Monitor {
        /// Signal snapshot (JSON object) or a list of snapshots replayed per cycle
        #[arg(long)]
        signals: PathBuf,
        /// Runtime configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Answer an escalation immediately instead of stopping
        #[arg(long, value_enum)]
        decision: Option<Decision>,
        /// Attach the session to this twin
        #[arg(long)]
        twin: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Acknowledge,
    Halt,
}

impl From<Decision> for HumanDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Acknowledge => HumanDecision::Acknowledged,
            Decision::Halt => HumanDecision::Halt,
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}

/// Get the default database path (~/.local/share/safetwin/safetwin.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("safetwin").join("safetwin.db")
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[derive(Serialize)]
struct DimensionEntry {
    dimension: Dimension,
    title: String,
    primary_label: &'static str,
    iso_clause: Option<&'static str>,
}

fn cmd_dimensions() -> i32 {
    let registry = SchemaRegistry::standard();
    let entries: Vec<DimensionEntry> = registry
        .dimensions()
        .into_iter()
        .filter_map(|d| registry.schema_for(d).ok())
        .map(|schema| DimensionEntry {
            dimension: schema.dimension,
            title: schema.dimension.title(),
            primary_label: schema.primary_label(),
            iso_clause: schema.iso_clause,
        })
        .collect();
    print_json(&entries)
}

fn cmd_schema(name: &str) -> i32 {
    let registry = SchemaRegistry::standard();
    match registry.schema_by_name(name) {
        Ok(schema) => print_json(schema),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_ingest(
    spec_path: &Path,
    data: &Path,
    credentials: Vec<(String, String)>,
    db: Option<PathBuf>,
    twin: Option<String>,
) -> Result<i32, String> {
    let spec = AdapterSpec::load(spec_path).map_err(|e| format!("Failed to load adapter spec: {}", e))?;
    let platform = spec.platform.clone();

    let db_path = db.unwrap_or_else(default_db_path);
    let store = SqliteGraphStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    let store: Arc<dyn GraphStore> = Arc::new(store);

    let manager = IngestionManager::new(Normalizer::default()).with_store(store);
    manager.register_adapter(Arc::new(MappedAdapter::new(spec, Arc::new(JsonDirSource::new(data)))));

    let credentials: Credentials = credentials.into_iter().collect();
    if !manager.connect(&platform, &credentials).await.map_err(|e| e.to_string())? {
        return Err(format!("Could not connect adapter '{}'", platform));
    }

    let result = manager
        .ingest(&platform, None, &Filters::new())
        .await
        .map_err(|e| e.to_string())?;

    #[derive(Serialize)]
    struct Output<'a> {
        ingestion: &'a safetwin::IngestionResult,
        twin: Option<safetwin::Twin>,
    }
    let twin = twin.map(|id| TwinStore::new().update_twin(&id, &result.normalization));
    Ok(print_json(&Output {
        ingestion: &result,
        twin,
    }))
}

/// Accept either one snapshot or a list of snapshots.
fn load_signal_frames(path: &Path) -> Result<Vec<SignalSnapshot>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("Invalid signals JSON: {}", e))?;
    let frames = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        other => serde_json::from_value(other).map(|frame| vec![frame]),
    };
    frames.map_err(|e| format!("Invalid signals JSON: {}", e))
}

async fn cmd_monitor(
    signals: &Path,
    config: Option<PathBuf>,
    decision: Option<Decision>,
    twin: Option<String>,
) -> Result<i32, String> {
    let config = match config {
        Some(path) => Config::load(&path).map_err(|e| e.to_string())?,
        None => Config::default(),
    };
    let frames = load_signal_frames(signals)?;

    let store: Arc<dyn GraphStore> = match &config.storage.sqlite_path {
        Some(path) => Arc::new(
            SqliteGraphStore::open(path).map_err(|e| format!("Failed to open database: {}", e))?,
        ),
        None => Arc::new(MemoryGraphStore::new()),
    };

    let engine = WorkflowEngine::new(config.workflow, Arc::new(ScriptedSignals::new(frames)))
        .with_dispatcher(ActionDispatcher::with_defaults(Some(store)))
        .with_recommender(Arc::new(RuleBasedRecommender));

    let session = match twin {
        Some(id) => SessionState::new().for_twin(id),
        None => SessionState::new(),
    };
    let mut state = engine.run(session).await.map_err(|e| e.to_string())?;

    if state.status == SessionStatus::Escalated {
        match decision {
            Some(decision) => {
                state = engine
                    .resume(state, decision.into())
                    .await
                    .map_err(|e| e.to_string())?;
            }
            None => eprintln!(
                "Session {} escalated at risk {}; rerun with --decision to answer it",
                state.session_id, state.risk_score
            ),
        }
    }
    Ok(print_json(&state))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Dimensions => Ok(cmd_dimensions()),
        Commands::Schema { dimension } => Ok(cmd_schema(&dimension)),
        Commands::Ingest {
            spec,
            data,
            credentials,
            db,
            twin,
        } => cmd_ingest(&spec, &data, credentials, db, twin).await,
        Commands::Monitor {
            signals,
            config,
            decision,
            twin,
        } => cmd_monitor(&signals, config, decision, twin).await,
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    std::process::exit(code);
}
