use std::fs;
use std::path::PathBuf;

use clap::Parser;
use freehand::config::ContourToolConfig;
use freehand::engine::{Action, EngineCore};
use freehand::error::{ConfigError, InteractionError};
use freehand::input::{Key, PointerEvent, Tool};
use freehand::viewport::{PlanarViewport, Point2, ViewportKind};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("event {index} failed: {source}")]
    Event { index: usize, source: InteractionError },
}

#[derive(Parser, Debug)]
#[command(name = "contour-replay", about = "Replay a freehand contour gesture script and print the resulting annotations")]
struct Cli {
    /// Gesture script (JSON).
    script: PathBuf,

    /// Tool config (JSON). Defaults to `CONTOUR_*` environment variables.
    #[arg(long, env = "CONTOUR_CONFIG")]
    config: Option<PathBuf>,

    /// Stop at the first event the engine rejects.
    #[arg(long)]
    strict: bool,

    /// Print the rendered display list instead of the store.
    #[arg(long)]
    render: bool,
}

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    viewport: ViewportSpec,
    #[serde(default = "default_tool")]
    tool: Tool,
    events: Vec<ScriptEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ViewportSpec {
    id: String,
    frame_of_reference_uid: String,
    kind: ViewportKind,
    width: f64,
    height: f64,
    mm_per_pixel: f64,
    reference_image_id: Option<String>,
}

impl Default for ViewportSpec {
    fn default() -> Self {
        Self {
            id: "viewport-1".into(),
            frame_of_reference_uid: "frame-1".into(),
            kind: ViewportKind::Stack,
            width: 512.0,
            height: 512.0,
            mm_per_pixel: 1.0,
            reference_image_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ScriptEvent {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Key { key: String },
    VolumeModified,
}

fn default_tool() -> Tool {
    Tool::Freehand
}

fn read(path: &PathBuf) -> Result<String, ReplayError> {
    fs::read_to_string(path).map_err(|source| ReplayError::Read { path: path.clone(), source })
}

fn build_viewport(spec: &ViewportSpec) -> PlanarViewport {
    let mut viewport = PlanarViewport::axial(&spec.id, &spec.frame_of_reference_uid, spec.width, spec.height);
    viewport.kind = spec.kind;
    viewport.reference_image_id.clone_from(&spec.reference_image_id);
    viewport.set_mm_per_pixel(spec.mm_per_pixel);
    viewport
}

fn replay(engine: &mut EngineCore, viewport: &PlanarViewport, events: &[ScriptEvent], strict: bool) -> Result<usize, ReplayError> {
    let mut last: Option<PointerEvent> = None;
    let mut completed = 0;
    for (index, event) in events.iter().enumerate() {
        let result = match event {
            ScriptEvent::Down { x, y } => {
                let evt = PointerEvent::at(viewport, Point2::new(*x, *y));
                let result = engine.on_pointer_down(viewport, &evt);
                last = Some(evt);
                result
            }
            ScriptEvent::Move { x, y } | ScriptEvent::Up { x, y } => {
                let canvas = Point2::new(*x, *y);
                let evt = match &last {
                    Some(prev) => prev.moved_to(viewport, canvas),
                    None => PointerEvent::at(viewport, canvas),
                };
                let result = if matches!(event, ScriptEvent::Up { .. }) {
                    engine.on_pointer_up(viewport, &evt)
                } else {
                    engine.on_pointer_move(viewport, &evt)
                };
                last = Some(evt);
                result
            }
            ScriptEvent::Key { key } => engine.on_key_down(viewport, &Key(key.clone())),
            ScriptEvent::VolumeModified => Ok(engine.on_volume_modified(&viewport.frame_of_reference_uid)),
        };
        match result {
            Ok(actions) => {
                completed += actions.iter().filter(|a| matches!(a, Action::AnnotationCompleted(_))).count();
            }
            Err(source) if strict => return Err(ReplayError::Event { index, source }),
            Err(error) => warn!(index, %error, "event rejected"),
        }
    }
    Ok(completed)
}

fn main() -> Result<(), ReplayError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ContourToolConfig::from_json(&read(path)?)?,
        None => ContourToolConfig::from_env()?,
    };
    let script: Script = serde_json::from_str(&read(&cli.script)?)?;
    let viewport = build_viewport(&script.viewport);

    let mut engine = EngineCore::new(config);
    engine.set_tool(script.tool);
    let completed = replay(&mut engine, &viewport, &script.events, cli.strict)?;
    info!(events = script.events.len(), completed, annotations = engine.store.len(), "replay finished");

    let rendered = if cli.render {
        serde_json::to_string_pretty(&engine.render(&viewport))?
    } else {
        serde_json::to_string_pretty(&engine.store.export_state(None, None))?
    };
    println!("{rendered}");
    Ok(())
}
