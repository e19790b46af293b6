//! Assembly pipeline: descriptor → sidecar metadata → media → cover → mux.
//!
//! One run owns one [`Workspace`]. Steps run strictly in order and each
//! consumes the previous step's artifact. Whatever happens, the workspace
//! is removed before the run returns, and the first error is returned as-is.

pub mod commands;
pub mod metadata;
pub mod path;
pub mod workspace;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::FetcherConfig;
use crate::error::{FetchError, FetchResult};
use crate::http::HttpClient;
use crate::loader::BookLoader;
use crate::orchestrator::wait;
use crate::process::ToolRunner;
use crate::types::{BookDescriptor, ContentRef};

pub use workspace::Workspace;

/// Progress of one pipeline run. A failure at any stage jumps to `Cleaned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Created,
    DescriptorFetched,
    OutputPathValidated,
    MetadataWritten,
    ContentFetched,
    CoverFetched,
    Assembled,
    Cleaned,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Created => "created",
            PipelineStage::DescriptorFetched => "descriptor fetched",
            PipelineStage::OutputPathValidated => "output path validated",
            PipelineStage::MetadataWritten => "metadata written",
            PipelineStage::ContentFetched => "content fetched",
            PipelineStage::CoverFetched => "cover fetched",
            PipelineStage::Assembled => "assembled",
            PipelineStage::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

struct Progress {
    stage: PipelineStage,
}

impl Progress {
    fn advance(&mut self, next: PipelineStage) {
        debug!("stage: {} -> {next}", self.stage);
        self.stage = next;
    }
}

/// Fetch a descriptor with `loader`, bounded by an outer `timeout`.
///
/// The timeout covers the whole acquisition including the loader's own
/// retries; when it fires the loader's token is cancelled and its future
/// dropped.
pub async fn fetch_descriptor(
    loader: &dyn BookLoader,
    url: &Url,
    timeout: Duration,
    cancel: &CancellationToken,
) -> FetchResult<BookDescriptor> {
    wait(timeout, cancel, |child| async move { loader.load(url, &child).await }).await
}

/// Runs the full fetch-and-assemble sequence for one book.
pub struct Fetcher {
    loader: Arc<dyn BookLoader>,
    runner: Arc<dyn ToolRunner>,
    http: HttpClient,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new(
        loader: Arc<dyn BookLoader>,
        runner: Arc<dyn ToolRunner>,
        http: HttpClient,
        config: FetcherConfig,
    ) -> Self {
        Self {
            loader,
            runner,
            http,
            config,
        }
    }

    /// Fetch the book at `url` and write it to the path `template` expands to.
    ///
    /// Returns the path of the finished file.
    pub async fn fetch(
        &self,
        url: &Url,
        template: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<PathBuf> {
        if template.trim().is_empty() {
            return Err(FetchError::Usage("output path template is empty".to_string()));
        }
        let workspace = Workspace::create(&self.config.temp_root)?;
        let mut progress = Progress {
            stage: PipelineStage::Created,
        };

        let result = self
            .run_steps(&workspace, &mut progress, url, template, cancel)
            .await;
        if let Err(e) = &result {
            warn!("failed after stage '{}': {e}", progress.stage);
        }

        let root = workspace.root().to_path_buf();
        if let Err(e) = workspace.remove() {
            warn!("failed to remove workspace {}: {e}", root.display());
        }
        progress.advance(PipelineStage::Cleaned);

        result
    }

    async fn run_steps(
        &self,
        workspace: &Workspace,
        progress: &mut Progress,
        url: &Url,
        template: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<PathBuf> {
        info!("fetching descriptor");
        let book = fetch_descriptor(
            self.loader.as_ref(),
            url,
            self.config.descriptor_timeout,
            cancel,
        )
        .await?;
        progress.advance(PipelineStage::DescriptorFetched);

        let output = path::output_path(template, &book);
        if tokio::fs::try_exists(&output).await? {
            return Err(FetchError::FileExists(output));
        }
        info!("output: {}", output.display());
        progress.advance(PipelineStage::OutputPathValidated);

        info!("writing metadata");
        let sidecar = metadata::render(&book, self.config.field_cap);
        tokio::fs::write(workspace.metadata_path(), sidecar).await?;
        progress.advance(PipelineStage::MetadataWritten);

        info!("fetching media");
        self.fetch_content(&book.content, &workspace.media_path(), cancel)
            .await?;
        progress.advance(PipelineStage::ContentFetched);

        info!("fetching cover");
        self.fetch_cover(&book.cover_url, workspace, cancel).await?;
        progress.advance(PipelineStage::CoverFetched);

        info!("assembling");
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let args = commands::mux_args(
            &workspace.media_path(),
            &workspace.metadata_path(),
            &workspace.cover_path(),
            &output,
        );
        self.runner.run(&args, cancel).await?;
        progress.advance(PipelineStage::Assembled);

        info!("completed: {}", output.display());
        Ok(output)
    }

    async fn fetch_content(
        &self,
        content: &ContentRef,
        output: &Path,
        cancel: &CancellationToken,
    ) -> FetchResult<()> {
        match content {
            ContentRef::Playlist { url } => {
                self.runner
                    .run(&commands::remux_args(url, output), cancel)
                    .await
            }
        }
    }

    async fn fetch_cover(
        &self,
        url: &Url,
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> FetchResult<()> {
        let downloaded = workspace.cover_download_path();
        let bytes = self.http.download(url, &downloaded, cancel).await?;
        debug!("downloaded {bytes} bytes of cover art");
        self.runner
            .run(
                &commands::cover_args(&downloaded, &workspace.cover_path()),
                cancel,
            )
            .await
    }
}
