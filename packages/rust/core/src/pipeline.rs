//! End-to-end pipelines: identifiers → Markdown digest → PDF.
//!
//! `collect` dispatches identifiers and writes the merged Markdown, `render`
//! restructures a digest and hands it to the rendering backend, `run` chains
//! the two. `spawn_task` runs any of them in the background with its progress
//! mirrored into a [`ProgressEmitter`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use mdigest_dispatch::{
    BatchDispatcher, DispatchProgress, DispatchReport, MarkdownGenerator, merge_outcomes,
};
use mdigest_markdown::{HighlightSet, transform};
use mdigest_shared::{
    DigestError, DispatchConfig, FetchOutcome, ProgressEvent, Result, SourceItem, TaskId,
};

use crate::progress::{ProgressEmitter, TaskHandle};
use crate::render::RenderBackend;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// A human-readable status line.
    fn message(&self, text: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn message(&self, _text: &str) {}
}

/// Reports into a task's event log.
#[derive(Debug, Clone)]
pub struct EmitterProgress {
    emitter: ProgressEmitter,
    id: TaskId,
}

impl EmitterProgress {
    pub fn new(emitter: ProgressEmitter, id: TaskId) -> Self {
        Self { emitter, id }
    }
}

impl ProgressReporter for EmitterProgress {
    fn message(&self, text: &str) {
        self.emitter.emit(&self.id, ProgressEvent::message(text));
    }
}

/// Adapts a `ProgressReporter` to the dispatcher's callbacks.
struct DispatchMessages<'a> {
    inner: &'a dyn ProgressReporter,
}

impl DispatchProgress for DispatchMessages<'_> {
    fn batch_started(&self, batch: usize, total: usize, items: usize, remaining: usize) {
        self.inner.message(&format!(
            "processing batch {batch}/{total} ({items} items, {remaining} batches remaining)"
        ));
    }

    fn item_finished(&self, outcome: &FetchOutcome) {
        if let Some(error) = outcome.error() {
            self.inner
                .message(&format!("error processing {}: {error}", outcome.identifier));
        }
    }

    fn batch_finished(&self, batch: usize, _total: usize) {
        self.inner.message(&format!("batch {batch} complete"));
    }
}

// ---------------------------------------------------------------------------
// Output naming
// ---------------------------------------------------------------------------

/// Local timestamp used in output file names (`YYYYmmdd_HHMMSS`).
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `AI_news_summary_<ts>.md`, the default `collect` output.
pub fn collect_output_path(dir: &Path, ts: &str) -> PathBuf {
    dir.join(format!("AI_news_summary_{ts}.md"))
}

/// `news_summary_<ts>.md` / `.pdf`, the default `run` outputs.
pub fn run_output_paths(dir: &Path, ts: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("news_summary_{ts}.md")),
        dir.join(format!("news_summary_{ts}.pdf")),
    )
}

/// `<stem>_<ts>.pdf` and `<stem>_<ts>_with_toc.md` for rendering `source`.
pub fn render_output_paths(dir: &Path, source: &Path, ts: &str) -> RenderPaths {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "digest".into());

    RenderPaths {
        pdf_path: dir.join(format!("{stem}_{ts}.pdf")),
        markdown_path: dir.join(format!("{stem}_{ts}_with_toc.md")),
    }
}

/// Where `render` writes its two artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPaths {
    pub pdf_path: PathBuf,
    /// Markdown with the generated TOC, written even if PDF rendering fails.
    pub markdown_path: PathBuf,
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DigestError::io(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| DigestError::io(path, e))
}

// ---------------------------------------------------------------------------
// collect
// ---------------------------------------------------------------------------

/// Configuration for [`collect`].
#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub dispatch: DispatchConfig,
    /// Destination of the merged Markdown.
    pub output_path: PathBuf,
}

/// Result of [`collect`].
#[derive(Debug)]
pub struct CollectResult {
    pub markdown_path: PathBuf,
    /// The merged document that was written.
    pub markdown: String,
    pub report: DispatchReport,
    pub elapsed: std::time::Duration,
}

/// Dispatch `items`, merge the successful fragments in input order and write
/// the result.
///
/// Fails with [`DigestError::Validation`] for an empty item list and with
/// [`DigestError::EmptyResult`] when no item produced content.
#[instrument(skip_all, fields(items = items.len(), output = %config.output_path.display()))]
pub async fn collect<G>(
    config: &CollectConfig,
    items: &[SourceItem],
    generator: Arc<G>,
    progress: &dyn ProgressReporter,
) -> Result<CollectResult>
where
    G: MarkdownGenerator + ?Sized + 'static,
{
    if items.is_empty() {
        return Err(DigestError::validation("no source identifiers to collect"));
    }

    let start = Instant::now();
    let dispatcher = BatchDispatcher::from_config(&config.dispatch);

    progress.message(&format!(
        "starting {} identifiers in {} batches of up to {}",
        items.len(),
        dispatcher.batch_count(items.len()),
        dispatcher.batch_size()
    ));

    let report = dispatcher
        .dispatch(items, generator, &DispatchMessages { inner: progress })
        .await;

    progress.message(&format!(
        "{}/{} identifiers produced content",
        report.succeeded(),
        report.total()
    ));

    let markdown = merge_outcomes(&report.outcomes).ok_or(DigestError::EmptyResult {
        total: report.total(),
    })?;

    write_file(&config.output_path, markdown.as_bytes()).await?;
    progress.message(&format!("saved {}", config.output_path.display()));

    let result = CollectResult {
        markdown_path: config.output_path.clone(),
        markdown,
        report,
        elapsed: start.elapsed(),
    };

    info!(
        succeeded = result.report.succeeded(),
        total = result.report.total(),
        elapsed_ms = result.elapsed.as_millis(),
        "collect complete"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

/// Configuration for [`render`].
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub paths: RenderPaths,
    /// Document title; the date is appended as `" - YYYY/MM/DD"`.
    pub title: String,
    pub date: NaiveDate,
}

impl RenderJob {
    pub fn new(paths: RenderPaths, title: impl Into<String>) -> Self {
        Self {
            paths,
            title: title.into(),
            date: Local::now().date_naive(),
        }
    }

    /// `"<title> - YYYY/MM/DD"`.
    pub fn title_line(&self) -> String {
        format!("{} - {}", self.title, self.date.format("%Y/%m/%d"))
    }
}

/// Result of [`render`]. A backend failure is not an error: the Markdown
/// artifact is still produced and `render_error` says what went wrong.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub markdown_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
    pub render_error: Option<String>,
    pub heading_count: usize,
    pub highlighted_count: usize,
}

impl RenderResult {
    /// The most useful artifact: the PDF when there is one.
    pub fn primary_output(&self) -> &Path {
        self.pdf_path.as_deref().unwrap_or(&self.markdown_path)
    }
}

/// Restructure `markdown` (TOC, anchors, optional highlights), write the
/// Markdown-with-TOC artifact, then render the PDF through `backend`.
#[instrument(skip_all, fields(pdf = %job.paths.pdf_path.display(), highlighted = highlights.is_some()))]
pub async fn render<B>(
    job: &RenderJob,
    markdown: &str,
    highlights: Option<&HighlightSet>,
    backend: &B,
    progress: &dyn ProgressReporter,
) -> Result<RenderResult>
where
    B: RenderBackend + ?Sized,
{
    progress.message("building table of contents");
    let transformed = transform(markdown, highlights);
    let highlighted_count = transformed.toc.iter().filter(|e| e.highlighted).count();

    write_file(
        &job.paths.markdown_path,
        transformed.markdown_with_toc().as_bytes(),
    )
    .await?;
    progress.message(&format!(
        "saved {}",
        job.paths.markdown_path.display()
    ));

    progress.message("rendering pdf");
    let html = transformed.to_html_document(&job.title_line());

    let (pdf_path, render_error) = match backend.render(&html).await {
        Ok(pdf) => {
            write_file(&job.paths.pdf_path, &pdf).await?;
            progress.message(&format!("saved {}", job.paths.pdf_path.display()));
            (Some(job.paths.pdf_path.clone()), None)
        }
        Err(e) => {
            warn!(error = %e, "pdf rendering failed, keeping markdown output");
            progress.message(&format!("pdf rendering failed: {e}"));
            (None, Some(e.to_string()))
        }
    };

    info!(
        headings = transformed.headings.len(),
        highlighted = highlighted_count,
        pdf = pdf_path.is_some(),
        "render complete"
    );

    Ok(RenderResult {
        markdown_path: job.paths.markdown_path.clone(),
        pdf_path,
        render_error,
        heading_count: transformed.headings.len(),
        highlighted_count,
    })
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Result of [`run`].
#[derive(Debug)]
pub struct RunResult {
    pub collect: CollectResult,
    pub render: RenderResult,
}

/// `collect` followed by `render` on the merged document.
pub async fn run<G, B>(
    collect_config: &CollectConfig,
    job: &RenderJob,
    items: &[SourceItem],
    generator: Arc<G>,
    highlights: Option<&HighlightSet>,
    backend: &B,
    progress: &dyn ProgressReporter,
) -> Result<RunResult>
where
    G: MarkdownGenerator + ?Sized + 'static,
    B: RenderBackend + ?Sized,
{
    let collected = collect(collect_config, items, generator, progress).await?;
    let rendered = render(job, &collected.markdown, highlights, backend, progress).await?;

    Ok(RunResult {
        collect: collected,
        render: rendered,
    })
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Run `job` on a background task, with its progress going into `emitter`.
///
/// The task always ends with exactly one terminal event:
/// `Completed(<output path>)` on success, `Failed(<message>)` on error or
/// panic.
pub fn spawn_task<F, Fut>(emitter: &ProgressEmitter, job: F) -> (TaskHandle, JoinHandle<()>)
where
    F: FnOnce(EmitterProgress) -> Fut + Send + 'static,
    Fut: Future<Output = Result<PathBuf>> + Send + 'static,
{
    let handle = emitter.create_task();
    let id = handle.id().clone();
    let emitter = emitter.clone();
    let reporter = EmitterProgress::new(emitter.clone(), id.clone());

    let supervisor = tokio::spawn(async move {
        // Building the job's future happens inside the worker too, so a panic
        // there still ends in a terminal event.
        let terminal = match tokio::spawn(async move { job(reporter).await }).await {
            Ok(Ok(path)) => ProgressEvent::Completed(path.display().to_string()),
            Ok(Err(e)) => {
                warn!(task_id = %id, error = %e, "task failed");
                ProgressEvent::Failed(e.to_string())
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "task panicked");
                ProgressEvent::Failed(format!("task aborted: {e}"))
            }
        };
        emitter.emit(&id, terminal);
    });

    (handle, supervisor)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Fails for identifiers containing "bad", echoes a heading otherwise.
    struct EchoGenerator;

    #[async_trait]
    impl MarkdownGenerator for EchoGenerator {
        async fn generate(&self, identifier: &str) -> Result<String> {
            if identifier.contains("bad") {
                return Err(DigestError::generation(identifier, "HTTP 500"));
            }
            Ok(format!("# News from {identifier}\nbody"))
        }
    }

    struct FakeBackend {
        fail: bool,
        seen: Mutex<Option<String>>,
    }

    impl FakeBackend {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl RenderBackend for FakeBackend {
        async fn render(&self, html: &str) -> Result<Vec<u8>> {
            *self.seen.lock().unwrap() = Some(html.to_string());
            if self.fail {
                Err(DigestError::Render("wkhtmltopdf exited with 1".into()))
            } else {
                Ok(b"%PDF-1.4 fake".to_vec())
            }
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        messages: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn message(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mdigest-{name}-{}", TaskId::new()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn items(ids: &[&str]) -> Vec<SourceItem> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| SourceItem::new(i, *id))
            .collect()
    }

    fn job_in(dir: &Path) -> RenderJob {
        RenderJob {
            paths: render_output_paths(dir, Path::new("digest.md"), "20250101_120000"),
            title: "AI News Summary".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    #[test]
    fn output_names() {
        let dir = Path::new("out");
        assert_eq!(
            collect_output_path(dir, "20250101_120000"),
            Path::new("out/AI_news_summary_20250101_120000.md")
        );
        let (md, pdf) = run_output_paths(dir, "ts");
        assert_eq!(md, Path::new("out/news_summary_ts.md"));
        assert_eq!(pdf, Path::new("out/news_summary_ts.pdf"));

        let paths = render_output_paths(dir, Path::new("in/weekly.md"), "ts");
        assert_eq!(paths.pdf_path, Path::new("out/weekly_ts.pdf"));
        assert_eq!(paths.markdown_path, Path::new("out/weekly_ts_with_toc.md"));
    }

    #[test]
    fn title_line_has_date() {
        let job = job_in(Path::new("out"));
        assert_eq!(job.title_line(), "AI News Summary - 2025/01/01");
    }

    #[tokio::test]
    async fn collect_writes_merged_markdown() {
        let dir = temp_dir("collect");
        let config = CollectConfig {
            dispatch: DispatchConfig::new(2).unwrap(),
            output_path: dir.join("nested").join("digest.md"),
        };
        let progress = RecordingProgress::default();

        let result = collect(
            &config,
            &items(&["bad-1", "a", "b"]),
            Arc::new(EchoGenerator),
            &progress,
        )
        .await
        .unwrap();

        let written = std::fs::read_to_string(&result.markdown_path).unwrap();
        assert_eq!(written, "# News from a\nbody\n\n# News from b\nbody");
        assert_eq!(result.report.succeeded(), 2);

        let messages = progress.messages.lock().unwrap().clone();
        assert!(messages.contains(&"processing batch 1/2 (2 items, 1 batches remaining)".to_string()));
        assert!(messages.contains(&"error processing bad-1: HTTP 500".to_string()));
        assert!(messages.contains(&"batch 2 complete".to_string()));
        assert!(messages.contains(&"2/3 identifiers produced content".to_string()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn collect_with_no_content_is_empty_result() {
        let dir = temp_dir("empty");
        let config = CollectConfig {
            dispatch: DispatchConfig::new(3).unwrap(),
            output_path: dir.join("digest.md"),
        };

        let err = collect(
            &config,
            &items(&["bad-1", "bad-2"]),
            Arc::new(EchoGenerator),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DigestError::EmptyResult { total: 2 }));
        assert!(!config.output_path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn collect_rejects_empty_input() {
        let dir = temp_dir("no-items");
        let config = CollectConfig {
            dispatch: DispatchConfig::new(3).unwrap(),
            output_path: dir.join("digest.md"),
        };

        let err = collect(&config, &[], Arc::new(EchoGenerator), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, DigestError::Validation { .. }));
        assert!(!config.output_path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn render_writes_toc_markdown_and_pdf() {
        let dir = temp_dir("render");
        let job = job_in(&dir);
        let backend = FakeBackend::new(false);
        let highlights = HighlightSet::parse("openai");

        let result = render(
            &job,
            "# 目录\n- stale\n# OpenAI news\nbody\n# Other\ntext",
            Some(&highlights),
            &backend,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.heading_count, 2);
        assert_eq!(result.highlighted_count, 1);
        assert_eq!(result.primary_output(), job.paths.pdf_path.as_path());
        assert_eq!(std::fs::read(&job.paths.pdf_path).unwrap(), b"%PDF-1.4 fake");

        let markdown = std::fs::read_to_string(&job.paths.markdown_path).unwrap();
        assert!(markdown.starts_with("# 目录\n\n- **[OpenAI news](#openai-news)**"));
        assert!(!markdown.contains("stale"));

        let html = backend.seen.lock().unwrap().clone().unwrap();
        assert!(html.contains("AI News Summary - 2025/01/01"));
        assert!(html.contains("class='highlight'"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn render_backend_failure_keeps_markdown() {
        let dir = temp_dir("render-fail");
        let job = job_in(&dir);

        let result = render(&job, "# Title\nbody", None, &FakeBackend::new(true), &SilentProgress)
            .await
            .unwrap();

        assert!(result.pdf_path.is_none());
        assert!(result.render_error.as_deref().unwrap().contains("exited with 1"));
        assert_eq!(result.primary_output(), job.paths.markdown_path.as_path());
        assert!(job.paths.markdown_path.exists());
        assert!(!job.paths.pdf_path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn run_chains_collect_and_render() {
        let dir = temp_dir("run");
        let (md, pdf) = run_output_paths(&dir, "ts");
        let collect_config = CollectConfig {
            dispatch: DispatchConfig::new(10).unwrap(),
            output_path: md.clone(),
        };
        let job = RenderJob::new(
            RenderPaths {
                pdf_path: pdf.clone(),
                markdown_path: dir.join("news_summary_ts_with_toc.md"),
            },
            "Digest",
        );

        let result = run(
            &collect_config,
            &job,
            &items(&["a", "b"]),
            Arc::new(EchoGenerator),
            None,
            &FakeBackend::new(false),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.collect.markdown_path, md);
        assert_eq!(result.render.pdf_path.as_deref(), Some(pdf.as_path()));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn spawned_task_ends_with_completed() {
        let emitter = ProgressEmitter::default();

        let (task, join) = spawn_task(&emitter, |progress| async move {
            progress.message("halfway");
            Ok(PathBuf::from("output/a.pdf"))
        });
        join.await.unwrap();

        let mut sub = emitter.subscribe(task.id());
        assert_eq!(sub.next().await, Some(ProgressEvent::message("halfway")));
        assert_eq!(
            sub.next().await,
            Some(ProgressEvent::Completed("output/a.pdf".into()))
        );
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn spawned_task_failure_and_panic_end_with_failed() {
        let emitter = ProgressEmitter::default();

        let (failed, join) = spawn_task(&emitter, |_| async move {
            Err(DigestError::EmptyResult { total: 3 })
        });
        join.await.unwrap();

        let (panicked, join) = spawn_task(&emitter, |_| async move {
            if true {
                panic!("worker exploded");
            }
            Ok(PathBuf::new())
        });
        join.await.unwrap();

        let mut sub = emitter.subscribe(failed.id());
        match sub.next().await {
            Some(ProgressEvent::Failed(message)) => assert!(message.contains("3 source items")),
            other => panic!("unexpected event: {other:?}"),
        }

        let mut sub = emitter.subscribe(panicked.id());
        assert!(matches!(sub.next().await, Some(ProgressEvent::Failed(_))));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn panic_while_building_job_ends_with_failed() {
        let emitter = ProgressEmitter::default();

        let (task, join) = spawn_task(&emitter, |_progress: EmitterProgress| {
            if true {
                panic!("could not build job");
            }
            async move { Ok(PathBuf::new()) }
        });
        join.await.unwrap();

        let mut sub = emitter.subscribe(task.id());
        match sub.next().await {
            Some(ProgressEvent::Failed(message)) => assert!(message.contains("task aborted")),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(sub.next().await, None);
    }
}
