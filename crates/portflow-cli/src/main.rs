//! Port propagation CLI.
//!
//! Provides the `portflow` binary for running the propagation engine over
//! saved workflow documents outside an interactive editor:
//!
//! - `sync` loads a workflow, lets every dynamic node settle (including the
//!   deferred post-load pass), and writes the normalized workflow back out.
//! - `inspect` does the same and prints each node's ports and, for bus
//!   nodes, the published channel map.
//!
//! Exit codes: 0 = success, 1 = settings error, 2 = workflow parse error,
//! 3 = I/O error.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use portflow_core::Workflow;
use portflow_engine::{Editor, EngineError, EngineSettings, NodeDef};

/// Dynamic port and type propagation for node-graph workflows.
#[derive(Parser)]
#[command(name = "portflow", about = "Dynamic port and type propagation for workflows")]
struct Cli {
    /// Log engine passes at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(clap::Args)]
struct Source {
    /// Path to the workflow JSON document.
    #[arg(short, long)]
    workflow: PathBuf,

    /// Engine settings JSON file.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Extra node definitions (JSON array), e.g. switch classes.
    #[arg(long)]
    defs: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Settle every dynamic node and write the workflow back out.
    Sync {
        #[command(flatten)]
        source: Source,

        /// Output path (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Enable bus overwrite mode.
        #[arg(long)]
        overwrite: bool,
    },
    /// Print port tables and bus channel maps.
    Inspect {
        #[command(flatten)]
        source: Source,
    },
}

/// Failures mapped onto exit codes.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid settings: {0}")]
    Settings(EngineError),

    #[error("invalid workflow: {0}")]
    Workflow(EngineError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Settings(_) => 1,
            CliError::Workflow(_) => 2,
            CliError::Io { .. } => 3,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sync {
            source,
            output,
            overwrite,
        } => run_sync(&source, output.as_deref(), overwrite),
        Commands::Inspect { source } => run_inspect(&source),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        process::exit(err.exit_code());
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the default level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn run_sync(source: &Source, output: Option<&Path>, overwrite: bool) -> Result<(), CliError> {
    let settings = load_settings(source.settings.as_deref(), overwrite)?;
    let editor = settle_workflow(source, settings)?;
    let json = editor
        .to_workflow()
        .to_json_pretty()
        .map_err(|e| CliError::Workflow(e.into()))?;

    match output {
        Some(path) => write_file(path, &json),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

fn run_inspect(source: &Source) -> Result<(), CliError> {
    let settings = load_settings(source.settings.as_deref(), false)?;
    let editor = settle_workflow(source, settings)?;
    print!("{}", render_report(&editor));
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Layers defaults, then the settings file, then the environment, then
/// command-line flags.
fn load_settings(path: Option<&Path>, overwrite: bool) -> Result<EngineSettings, CliError> {
    let mut settings = match path {
        Some(path) => EngineSettings::load(path).map_err(CliError::Settings)?,
        None => EngineSettings::default(),
    }
    .with_env_overrides();
    if overwrite {
        settings.bus_overwrite = true;
    }
    Ok(settings)
}

/// Loads the workflow into a fresh editor and runs it to quiescence,
/// post-load timers included.
fn settle_workflow(source: &Source, settings: EngineSettings) -> Result<Editor, CliError> {
    let delay = settings.post_load_delay();
    let mut editor = Editor::new(settings);

    if let Some(path) = &source.defs {
        let text = read_file(path)?;
        let defs: Vec<NodeDef> = serde_json::from_str(&text)
            .map_err(|e| CliError::Workflow(EngineError::Json(e)))?;
        for def in defs {
            let class = def.class_type.clone();
            if editor.register_node_def(def).is_none() {
                tracing::warn!(class = %class, "node definition is not a dynamic kind");
            }
        }
    }

    let text = read_file(&source.workflow)?;
    let workflow = Workflow::from_json(&text).map_err(|e| CliError::Workflow(e.into()))?;
    editor.load_workflow(workflow).map_err(CliError::Workflow)?;
    editor.settle();
    editor.advance(delay);
    Ok(editor)
}

/// One block per node: class, then input and output rows, then the bus
/// channel map when the node publishes one.
fn render_report(editor: &Editor) -> String {
    let mut out = String::new();
    for node in editor.graph().nodes() {
        let kind = match editor.kind(node.id) {
            Some(kind) => format!("{:?}", kind),
            None => "plain".to_string(),
        };
        out.push_str(&format!("#{} {} ({})\n", node.id, node.class_type, kind));
        for (i, slot) in node.inputs.iter().enumerate() {
            let link = slot.link.map(|l| format!(" <- {}", l)).unwrap_or_default();
            out.push_str(&format!(
                "  in  {:>2} {:<12} {:<12} {}{}\n",
                i,
                slot.name,
                slot.display_text(),
                slot.ty,
                link
            ));
        }
        for (i, slot) in node.outputs.iter().enumerate() {
            let links = if slot.links.is_empty() {
                String::new()
            } else {
                let ids: Vec<String> = slot.links.iter().map(|l| l.to_string()).collect();
                format!(" -> {}", ids.join(","))
            };
            out.push_str(&format!(
                "  out {:>2} {:<12} {:<12} {}{}\n",
                i,
                slot.name,
                slot.display_text(),
                slot.ty,
                links
            ));
        }
        if editor.kind(node.id).is_some_and(|k| k.is_bus()) {
            if let Some(map) = editor.channel_map(node.id) {
                out.push_str(&format!("  channels {}\n", map));
            }
        }
    }
    out
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r#"{
        "last_node_id": 2,
        "last_link_id": 1,
        "nodes": [
            { "id": 1, "type": "LoadImage",
              "outputs": [ { "name": "IMAGE", "type": "IMAGE", "links": [1] } ] },
            { "id": 2, "type": "PT_DynamicPassthrough",
              "inputs": [ { "name": "input_1", "type": "*", "link": 1 } ],
              "outputs": [ { "name": "output_1", "type": "*", "links": [] } ] }
        ],
        "links": [ [1, 1, 0, 2, 0, "IMAGE"] ]
    }"#;

    fn source(dir: &Path, workflow: &str) -> Source {
        let path = dir.join("workflow.json");
        std::fs::write(&path, workflow).unwrap();
        Source {
            workflow: path,
            settings: None,
            defs: None,
        }
    }

    #[test]
    fn sync_writes_a_normalized_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), WORKFLOW);
        let out = dir.path().join("out.json");
        run_sync(&src, Some(&out), false).unwrap();

        let written = Workflow::from_json(&std::fs::read_to_string(&out).unwrap()).unwrap();
        let node = written.nodes.iter().find(|n| n.id.0 == 2).unwrap();
        assert_eq!(node.inputs.len(), 2);
        assert_eq!(node.inputs[0].label, "image");
        assert_eq!(node.outputs[0].ty.as_str(), "IMAGE");
        assert_eq!(node.inputs[1].label, "input");
    }

    #[test]
    fn report_lists_ports() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), WORKFLOW);
        let editor = settle_workflow(&src, EngineSettings::default()).unwrap();
        let report = render_report(&editor);
        assert!(report.contains("#2 PT_DynamicPassthrough"));
        assert!(report.contains("image"));
        assert!(report.contains("#1 LoadImage (plain)"));
        assert!(report.contains("  out  0 IMAGE"));
        assert!(report.lines().any(|line| line.starts_with("  in   0 input_1") && line.ends_with("<- 1")));
        assert!(report.ends_with('\n'));
    }

    #[test]
    fn errors_map_to_exit_codes() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Source {
            workflow: dir.path().join("missing.json"),
            settings: None,
            defs: None,
        };
        assert_eq!(settle_workflow(&missing, EngineSettings::default()).unwrap_err().exit_code(), 3);

        let broken = source(dir.path(), "{ \"nodes\": [");
        assert_eq!(settle_workflow(&broken, EngineSettings::default()).unwrap_err().exit_code(), 2);

        let settings = dir.path().join("settings.json");
        std::fs::write(&settings, r#"{ "max_slots": 1 }"#).unwrap();
        assert_eq!(load_settings(Some(&settings), false).unwrap_err().exit_code(), 1);
    }

    #[test]
    fn overwrite_flag_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.json");
        std::fs::write(&settings, r#"{ "bus_overwrite": false, "max_slots": 8 }"#).unwrap();
        let loaded = load_settings(Some(&settings), true).unwrap();
        assert!(loaded.bus_overwrite);
        assert_eq!(loaded.max_slots, 8);
    }
}
