//! Core pipeline orchestration for mdigest.
//!
//! This crate ties together batch dispatch, Markdown restructuring and PDF
//! rendering into end-to-end workflows (`collect`, `render`, `run`), and owns
//! the progress registry and its server-push framing.

pub mod pipeline;
pub mod progress;
pub mod render;
pub mod sse;

pub use pipeline::{
    CollectConfig, CollectResult, EmitterProgress, ProgressReporter, RenderJob, RenderPaths,
    RenderResult, RunResult, SilentProgress, collect, collect_output_path, render,
    render_output_paths, run, run_output_paths, spawn_task, timestamp,
};
pub use progress::{DEFAULT_RETENTION, ProgressEmitter, Subscription, TaskChannel, TaskHandle};
pub use render::{RenderBackend, RenderOptions, WkhtmltopdfBackend};
pub use sse::{StreamPayload, event_stream, frame_event, parse_frame, parse_payload};
