//! Media ingestion: bytes → model file store → ready [`MediaReference`].
//!
//! Both entry shapes (direct multipart upload and staged storage transfer)
//! spool into a transient file under the configured temp dir, stream it to
//! the file store, then poll until the store reports the file ready. The
//! transient file is a `NamedTempFile` owned by the call, so it is removed on
//! every exit path.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use remix_gemini::{FileState, GeminiError, ModelFile, ModelFileStore};
use remix_models::MediaReference;
use remix_storage::{validate_upload_key, SignedUrlIssuer};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, info_span, warn, Instrument};

use super::error::{PipelineError, PipelineResult};
use crate::config::PollPolicy;
use crate::metrics::record_ingestion;

/// Moves user media into the model's file store.
#[derive(Clone)]
pub struct IngestionPipeline {
    storage: Arc<dyn SignedUrlIssuer>,
    files: Arc<dyn ModelFileStore>,
    http: reqwest::Client,
    poll: PollPolicy,
    temp_dir: PathBuf,
}

impl IngestionPipeline {
    pub fn new(
        storage: Arc<dyn SignedUrlIssuer>,
        files: Arc<dyn ModelFileStore>,
        poll: PollPolicy,
        temp_dir: impl Into<PathBuf>,
    ) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PipelineError::Upstream(e.to_string()))?;

        Ok(Self {
            storage,
            files,
            http,
            poll,
            temp_dir: temp_dir.into(),
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Staged transfer: signed download → local spool → file store → poll.
    pub async fn transfer_from_storage(
        &self,
        path: &str,
        mime_type: &str,
    ) -> PipelineResult<MediaReference> {
        require_mime(mime_type)?;
        validate_upload_key(path)?;

        let download_url = self.storage.issue_download_url(path).await.map_err(|e| {
            warn!(path = %path, error = %e, "Signed download URL issuance failed");
            PipelineError::StorageAuthFailed(e.to_string())
        })?;

        let response = self
            .http
            .get(&download_url)
            .send()
            .await
            .map_err(|e| PipelineError::Upstream(format!("download request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!(path = %path, status, "Staged object download failed");
            return Err(PipelineError::DownloadFailed { status });
        }

        let display_name = path.rsplit('/').next().unwrap_or(path);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| PipelineError::Upstream(format!("download interrupted: {}", e))));

        self.ingest_stream(body, mime_type, display_name)
            .instrument(info_span!("ingest", source = "storage", path = %path))
            .await
    }

    /// Direct upload: the caller supplies the byte stream (e.g. a multipart field).
    pub async fn ingest_stream<S, B>(
        &self,
        stream: S,
        mime_type: &str,
        display_name: &str,
    ) -> PipelineResult<MediaReference>
    where
        S: Stream<Item = PipelineResult<B>>,
        B: AsRef<[u8]>,
    {
        require_mime(mime_type)?;
        let started = Instant::now();

        let (spooled, bytes) = self.spool(stream).await?;
        debug!(path = %spooled.path().display(), bytes, "Spooled upload to disk");

        let (result, polls) = self
            .upload_and_wait(spooled.path(), mime_type, display_name)
            .await;
        // Explicit for readability; dropping the handle unlinks the file.
        drop(spooled);

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        record_ingestion(outcome, polls, bytes, started.elapsed().as_secs_f64());

        match &result {
            Ok(media) => info!(
                uri = %media.uri,
                mime_type = %media.mime_type,
                bytes,
                polls,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Ingestion complete"
            ),
            Err(e) => warn!(error = %e, bytes, polls, "Ingestion failed"),
        }
        result
    }

    async fn spool<S, B>(&self, stream: S) -> PipelineResult<(NamedTempFile, u64)>
    where
        S: Stream<Item = PipelineResult<B>>,
        B: AsRef<[u8]>,
    {
        let spooled = tempfile::Builder::new()
            .prefix("remix-ingest-")
            .tempfile_in(&self.temp_dir)?;
        let mut file = tokio::fs::File::from_std(spooled.as_file().try_clone()?);

        let mut stream = std::pin::pin!(stream);
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let chunk = chunk.as_ref();
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(PipelineError::validation("uploaded file is empty"));
        }
        Ok((spooled, written))
    }

    async fn upload_and_wait(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> (PipelineResult<MediaReference>, u32) {
        let uploaded = match self.files.upload_file(path, mime_type, display_name).await {
            Ok(file) => file,
            Err(e) => return (Err(upload_error(e)), 0),
        };
        self.poll_until_ready(uploaded, mime_type).await
    }

    /// Poll the file store until the file leaves processing, bounded by
    /// `max_polls` status checks and the wall-clock `deadline`.
    pub async fn poll_until_ready(
        &self,
        file: ModelFile,
        declared_mime: &str,
    ) -> (PipelineResult<MediaReference>, u32) {
        let policy = self.poll;
        let mut polls: u32 = 0;

        let poll_loop = async {
            let mut current = file;
            loop {
                match current.state {
                    FileState::Active => return ready_reference(current, declared_mime),
                    FileState::Failed => {
                        let reason = current
                            .error
                            .unwrap_or_else(|| "the file store could not process the file".to_string());
                        return Err(PipelineError::IngestionFailed(reason));
                    }
                    FileState::Processing | FileState::Unspecified => {}
                }
                if polls >= policy.max_polls {
                    return Err(PipelineError::IngestionTimeout { polls });
                }

                tokio::time::sleep(policy.interval).await;
                polls += 1;
                current = self.files.get_file(&current.name).await?;
                debug!(name = %current.name, state = current.state.as_str(), polls, "Polled file state");
            }
        };

        let result = tokio::time::timeout(policy.deadline, poll_loop).await;
        match result {
            Ok(outcome) => (outcome, polls),
            Err(_) => (Err(PipelineError::IngestionTimeout { polls }), polls),
        }
    }
}

fn require_mime(mime_type: &str) -> PipelineResult<()> {
    if mime_type.trim().is_empty() || !mime_type.contains('/') {
        return Err(PipelineError::validation("mimeType must be a MIME type such as video/mp4"));
    }
    Ok(())
}

fn upload_error(err: GeminiError) -> PipelineError {
    if err.is_quota() {
        return PipelineError::UpstreamQuotaExceeded(err.to_string());
    }
    PipelineError::UploadFailed(err.to_string())
}

fn ready_reference(file: ModelFile, declared_mime: &str) -> PipelineResult<MediaReference> {
    let mime_type = if file.mime_type.is_empty() {
        declared_mime.to_string()
    } else {
        file.mime_type
    };
    MediaReference::new(file.uri, mime_type).map_err(PipelineError::IngestionFailed)
}

/// Map any displayable stream error into the pipeline taxonomy.
pub fn stream_error<E: Display>(context: &'static str) -> impl Fn(E) -> PipelineError {
    move |e| PipelineError::validation(format!("{}: {}", context, e))
}
