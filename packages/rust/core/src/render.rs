//! HTML → PDF rendering backend.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use mdigest_shared::{DigestError, RenderConfig, Result};

// ---------------------------------------------------------------------------
// RenderOptions
// ---------------------------------------------------------------------------

/// Layout options handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub encoding: String,
    pub page_size: String,
    /// Applied to all four sides.
    pub margin: String,
    pub outline: bool,
    pub outline_depth: u8,
    pub footer_right: String,
    pub footer_font_size: u8,
    pub footer_spacing: u8,
    pub internal_links: bool,
    pub local_file_access: bool,
    pub quiet: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for RenderOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            encoding: "UTF-8".into(),
            page_size: config.page_size.clone(),
            margin: config.margin.clone(),
            outline: config.outline,
            outline_depth: config.outline_depth,
            footer_right: config.footer_right.clone(),
            footer_font_size: config.footer_font_size,
            footer_spacing: config.footer_spacing,
            internal_links: config.internal_links,
            local_file_access: true,
            quiet: true,
        }
    }
}

impl RenderOptions {
    /// Command-line flags for `wkhtmltopdf`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--encoding".into(),
            self.encoding.clone(),
            "--page-size".into(),
            self.page_size.clone(),
        ];

        for side in ["top", "right", "bottom", "left"] {
            args.push(format!("--margin-{side}"));
            args.push(self.margin.clone());
        }

        if self.outline {
            args.push("--outline".into());
            args.push("--outline-depth".into());
            args.push(self.outline_depth.to_string());
        } else {
            args.push("--no-outline".into());
        }

        args.extend([
            "--footer-right".into(),
            self.footer_right.clone(),
            "--footer-font-size".into(),
            self.footer_font_size.to_string(),
            "--footer-spacing".into(),
            self.footer_spacing.to_string(),
        ]);

        args.push(if self.internal_links {
            "--enable-internal-links".into()
        } else {
            "--disable-internal-links".into()
        });
        if self.local_file_access {
            args.push("--enable-local-file-access".into());
        }
        if self.quiet {
            args.push("--quiet".into());
        }
        args
    }
}

// ---------------------------------------------------------------------------
// RenderBackend
// ---------------------------------------------------------------------------

/// Turns a complete HTML document into PDF bytes.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>>;
}

/// Pipes the document through a `wkhtmltopdf` subprocess (stdin → stdout).
#[derive(Debug, Clone)]
pub struct WkhtmltopdfBackend {
    program: PathBuf,
    options: RenderOptions,
}

impl WkhtmltopdfBackend {
    pub fn new(program: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self {
            program: program.into(),
            options,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(&config.wkhtmltopdf_path, RenderOptions::from(config))
    }

    /// Full argument list, ending with the stdin/stdout placeholders.
    pub fn args(&self) -> Vec<String> {
        let mut args = self.options.to_args();
        args.push("-".into());
        args.push("-".into());
        args
    }
}

#[async_trait]
impl RenderBackend for WkhtmltopdfBackend {
    #[instrument(skip_all, fields(program = %self.program.display(), html_len = html.len()))]
    async fn render(&self, html: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DigestError::Render(format!(
                    "failed to start {}: {e}",
                    self.program.display()
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DigestError::Render("failed to open backend stdin".into()))?;

        // Feed stdin concurrently so a full stdout pipe cannot deadlock us.
        let document = html.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            stdin.write_all(&document).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DigestError::Render(format!("backend did not finish: {e}")))?;

        if let Ok(Err(e)) = writer.await {
            debug!(error = %e, "backend closed stdin early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DigestError::Render(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(DigestError::Render("backend produced no output".into()));
        }

        debug!(bytes = output.stdout.len(), "pdf rendered");
        Ok(output.stdout)
    }
}
