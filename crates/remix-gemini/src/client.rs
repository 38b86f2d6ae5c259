//! Gemini REST client.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::GeminiConfig;
use crate::error::{GeminiError, GeminiResult};
use crate::metrics::{record_fallback, record_request};
use crate::model::{
    ContentModel, ContentRequest, GeneratedImage, ImageModel, ModelFile, ModelFileStore,
};
use crate::wire::{
    FileResource, GenerateContentRequest, GenerateContentResponse, PredictInstance,
    PredictParameters, PredictRequest, PredictResponse, StartUploadFile, StartUploadRequest,
    UploadResponse,
};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Gemini API client implementing the content, file-store and image traits.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a new client.
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        if config.models.is_empty() {
            return Err(GeminiError::config_error("at least one content model is required"));
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(GeminiError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, &self.config.api_key)
    }

    /// Wrap a call with a tracing span and request metrics.
    async fn execute_request<T, F>(&self, operation: &'static str, model: &str, fut: F) -> GeminiResult<T>
    where
        F: Future<Output = GeminiResult<T>>,
    {
        let span = info_span!("gemini_request", operation = %operation, model = %model);
        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.status_label(),
        };
        record_request(operation, model, outcome, latency_ms);

        result
    }

    async fn check_status(response: Response) -> GeminiResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(GeminiError::from_status(status, &body))
    }

    async fn generate_with_model(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> GeminiResult<String> {
        let url = self.url(&format!("v1beta/models/{}:generateContent", model));

        let response = self
            .authed(self.http.post(&url))
            .timeout(self.config.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(GeminiError::from_reqwest)?;
        let response = Self::check_status(response).await?;

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::invalid_response(e.to_string()))?;

        if let Some(text) = parsed.text() {
            return Ok(text);
        }
        match parsed.block_reason() {
            Some(reason) => Err(GeminiError::Blocked(reason)),
            None => Err(GeminiError::EmptyResponse(model.to_string())),
        }
    }

    async fn start_upload(
        &self,
        size: u64,
        mime_type: &str,
        display_name: &str,
    ) -> GeminiResult<String> {
        let response = self
            .authed(self.http.post(self.url("upload/v1beta/files")))
            .timeout(self.config.request_timeout)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: StartUploadFile { display_name },
            })
            .send()
            .await
            .map_err(GeminiError::from_reqwest)?;
        let response = Self::check_status(response).await?;

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| GeminiError::upload_failed("upload session response has no upload URL"))
    }
}

#[async_trait]
impl ContentModel for GeminiClient {
    async fn generate(&self, request: ContentRequest) -> GeminiResult<String> {
        let body = GenerateContentRequest::from(&request);
        let mut last_error = None;

        for model in &self.config.models {
            info!(model = %model, shape = %request.shape(), "Attempting Gemini generation");
            let result = self
                .execute_request("generate_content", model, self.generate_with_model(model, &body))
                .await;

            match result {
                Ok(text) => {
                    debug!(model = %model, chars = text.len(), "Gemini generation succeeded");
                    return Ok(text);
                }
                Err(e) if e.should_fall_back() => {
                    warn!(model = %model, error = %e, "Gemini model failed, trying next");
                    record_fallback(model);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| GeminiError::config_error("no content models configured")))
    }
}

#[async_trait]
impl ModelFileStore for GeminiClient {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> GeminiResult<ModelFile> {
        let size = tokio::fs::metadata(path).await?.len();

        let fut = async {
            let upload_url = self.start_upload(size, mime_type, display_name).await?;

            // Body streams from disk; the file is never held in memory.
            let file = tokio::fs::File::open(path).await?;
            let response = self
                .authed(self.http.post(&upload_url))
                .timeout(self.config.upload_timeout)
                .header(CONTENT_LENGTH, size)
                .header("X-Goog-Upload-Offset", "0")
                .header("X-Goog-Upload-Command", "upload, finalize")
                .body(reqwest::Body::from(file))
                .send()
                .await
                .map_err(GeminiError::from_reqwest)?;
            let response = Self::check_status(response).await?;

            let uploaded: UploadResponse = response
                .json()
                .await
                .map_err(|e| GeminiError::invalid_response(e.to_string()))?;
            Ok::<_, GeminiError>(ModelFile::from(uploaded.file))
        };

        let file = self.execute_request("upload_file", "files", fut).await?;
        info!(
            name = %file.name,
            size_bytes = size,
            state = file.state.as_str(),
            "Uploaded file to Gemini file store"
        );
        Ok(file)
    }

    async fn get_file(&self, name: &str) -> GeminiResult<ModelFile> {
        if !name.starts_with("files/") {
            return Err(GeminiError::invalid_response(format!(
                "unexpected file resource name '{}'",
                name
            )));
        }

        let fut = async {
            let response = self
                .authed(self.http.get(self.url(&format!("v1beta/{}", name))))
                .timeout(self.config.request_timeout)
                .send()
                .await
                .map_err(GeminiError::from_reqwest)?;
            let response = Self::check_status(response).await?;

            let file: FileResource = response
                .json()
                .await
                .map_err(|e| GeminiError::invalid_response(e.to_string()))?;
            Ok::<_, GeminiError>(ModelFile::from(file))
        };

        self.execute_request("get_file", "files", fut).await
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    async fn generate_image(&self, prompt: &str) -> GeminiResult<GeneratedImage> {
        let model = self.config.image_model.as_str();
        let url = self.url(&format!("v1beta/models/{}:predict", model));
        let body = PredictRequest {
            instances: vec![PredictInstance { prompt }],
            parameters: PredictParameters { sample_count: 1 },
        };

        let fut = async {
            let response = self
                .authed(self.http.post(&url))
                .timeout(self.config.request_timeout)
                .json(&body)
                .send()
                .await
                .map_err(GeminiError::from_reqwest)?;
            let response = Self::check_status(response).await?;

            let raw = response.text().await.map_err(GeminiError::from_reqwest)?;
            let parsed: PredictResponse = serde_json::from_str(&raw)
                .map_err(|e| GeminiError::invalid_response(e.to_string()))?;

            parsed
                .predictions
                .into_iter()
                .find_map(|p| {
                    let data = p.bytes_base64_encoded.filter(|d| !d.is_empty())?;
                    Some(GeneratedImage {
                        mime_type: p.mime_type.unwrap_or_else(|| "image/png".to_string()),
                        base64_data: data,
                    })
                })
                .ok_or(GeminiError::NoImage { raw })
        };

        self.execute_request("generate_image", model, fut).await
    }
}
