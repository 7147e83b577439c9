//! Text-to-image client built on the retrying executor.
//!
//! [`ImageGenerator`] sends a prediction request for a prompt, retries it
//! through a [`RetryingExecutor`], and pulls the base64 image out of the
//! reply. Rendering is left to an [`ImageSlot`], a small capability the UI
//! layer implements: the generator only tells it to show a loading state, an
//! image, or an error message.
//!
//! # Wire format
//!
//! ```text
//! POST {endpoint}/models/{model}:predict?key={api_key}
//! {"instances":{"prompt":"..."},"parameters":{"sampleCount":1,"aspectRatio":"16:9"}}
//!
//! 200 {"predictions":[{"bytesBase64Encoded":"iVBOR...","mimeType":"image/png"}]}
//! ```
//!
//! # Example
//!
//! ```rust
//! use persevere::imagen::{ImageGenConfig, ImageGenerator};
//! use persevere::testing::{RecordingSlot, ScriptedTransport, SlotEvent};
//! use persevere::Response;
//!
//! # tokio_test::block_on(async {
//! let reply = r#"{"predictions":[{"bytesBase64Encoded":"aGVsbG8="}]}"#;
//! let transport = ScriptedTransport::new([Ok(Response::new(200).with_body(reply))]);
//! let generator = ImageGenerator::new(transport, ImageGenConfig::default());
//!
//! let mut slot = RecordingSlot::new();
//! generator.render_into(&mut slot, "a lighthouse at dusk").await;
//!
//! assert_eq!(
//!     slot.current(),
//!     Some(&SlotEvent::Image {
//!         data_url: "data:image/png;base64,aGVsbG8=".to_string(),
//!         alt: "a lighthouse at dusk".to_string(),
//!     })
//! );
//! # });
//! ```

use std::fmt;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::executor::RetryingExecutor;
use crate::request::{Request, Response};
use crate::retry::{BackoffPolicy, RequestFailed, RetryEvent};
use crate::transport::{Classifier, StatusClassifier, Transport};

/// Default API root.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default image model.
pub const DEFAULT_MODEL: &str = "imagen-4.0-generate-001";

/// Default aspect ratio.
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// MIME type assumed when the reply does not name one.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Message used when the reply has neither an image nor an error message.
pub const FALLBACK_ERROR_MESSAGE: &str = "Image generation failed";

/// Message shown when the request itself failed or the reply was unreadable.
pub const LOADING_ERROR_MESSAGE: &str = "An error occurred while loading the image.";

/// Configuration of the image generation client.
///
/// Every field has a default, so a partial document deserializes cleanly.
///
/// # Examples
///
/// ```rust
/// use persevere::imagen::ImageGenConfig;
///
/// let config = ImageGenConfig::default().with_api_key("secret");
///
/// assert_eq!(config.model, "imagen-4.0-generate-001");
/// assert_eq!(
///     config.predict_url(),
///     "https://generativelanguage.googleapis.com/v1beta/models/imagen-4.0-generate-001:predict?key=secret"
/// );
/// assert!(!format!("{:?}", config).contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageGenConfig {
    /// API root, without a trailing `/models`.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// API key, sent as the `key` query parameter.
    pub api_key: String,
    /// Requested aspect ratio, e.g. `16:9`.
    pub aspect_ratio: String,
    /// Number of images requested per prompt.
    pub sample_count: u32,
    /// Retry schedule for prediction requests.
    pub retry: BackoffPolicy,
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            sample_count: 1,
            retry: BackoffPolicy::default(),
        }
    }
}

impl fmt::Debug for ImageGenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageGenConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("aspect_ratio", &self.aspect_ratio)
            .field("sample_count", &self.sample_count)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ImageGenConfig {
    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API root.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the aspect ratio.
    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = aspect_ratio.into();
        self
    }

    /// Set the retry schedule.
    pub fn with_retry(mut self, retry: BackoffPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Full URL of the prediction call.
    pub fn predict_url(&self) -> String {
        format!(
            "{}/models/{}:predict?key={}",
            self.endpoint.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Instance<'a>,
    parameters: Parameters<'a>,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters<'a> {
    sample_count: u32,
    aspect_ratio: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PredictReply {
    predictions: Vec<Prediction>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiErrorBody {
    message: Option<String>,
}

/// An image returned by the API, still base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    base64: String,
    mime_type: String,
    alt: String,
}

impl GeneratedImage {
    /// Create an image from its base64 payload.
    pub fn new(base64: impl Into<String>, mime_type: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            mime_type: mime_type.into(),
            alt: alt.into(),
        }
    }

    /// The base64 payload.
    pub fn base64(&self) -> &str {
        &self.base64
    }

    /// The MIME type of the decoded payload.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Alt text; the prompt the image was generated from.
    pub fn alt(&self) -> &str {
        &self.alt
    }

    /// A `data:` URL embedding the image.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Failure to produce an image.
#[derive(Debug)]
pub enum ImageError<E> {
    /// The prediction request failed after retries.
    Request(RequestFailed<E>),
    /// The prediction request could not be serialized.
    Encode(serde_json::Error),
    /// The reply was not valid JSON of the expected shape.
    Decode(serde_json::Error),
    /// The reply carried no image; holds the API's message or the fallback.
    Api(String),
}

impl<E> ImageError<E> {
    /// The text to show the user in place of the image.
    pub fn user_message(&self) -> String {
        match self {
            ImageError::Api(message) => format!("Error: {}", message),
            _ => LOADING_ERROR_MESSAGE.to_string(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for ImageError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Request(e) => write!(f, "{}", e),
            ImageError::Encode(e) => write!(f, "failed to encode prediction request: {}", e),
            ImageError::Decode(e) => write!(f, "failed to decode prediction reply: {}", e),
            ImageError::Api(message) => write!(f, "image generation failed: {}", message),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ImageError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Request(e) => Some(e),
            ImageError::Encode(e) | ImageError::Decode(e) => Some(e),
            ImageError::Api(_) => None,
        }
    }
}

/// Where a generated image is displayed.
///
/// Implemented by the UI layer. The generator calls `show_loading` first and
/// then exactly one of `show_image` or `show_error`.
pub trait ImageSlot {
    /// Show a loading indicator.
    fn show_loading(&mut self);

    /// Replace the loading indicator with the image.
    fn show_image(&mut self, image: &GeneratedImage);

    /// Replace the loading indicator with a user-facing error message.
    fn show_error(&mut self, message: &str);
}

/// Generates images for prompts.
#[derive(Debug, Clone)]
pub struct ImageGenerator<T, C = StatusClassifier> {
    executor: RetryingExecutor<T, C>,
    config: ImageGenConfig,
}

impl<T> ImageGenerator<T> {
    /// Create a generator over `transport`, retrying per `config.retry`.
    pub fn new(transport: T, config: ImageGenConfig) -> Self {
        let executor = RetryingExecutor::new(transport).with_policy(config.retry.clone());
        Self { executor, config }
    }
}

impl<T, C> ImageGenerator<T, C> {
    /// Create a generator around an already configured executor.
    ///
    /// The executor's policy wins over `config.retry`.
    pub fn with_executor(executor: RetryingExecutor<T, C>, config: ImageGenConfig) -> Self {
        Self { executor, config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ImageGenConfig {
        &self.config
    }

    /// The executor in use.
    pub fn executor(&self) -> &RetryingExecutor<T, C> {
        &self.executor
    }

    /// Build the prediction request for `prompt`.
    pub fn request_for(&self, prompt: &str) -> Result<Request, serde_json::Error> {
        let payload = PredictRequest {
            instances: Instance { prompt },
            parameters: Parameters {
                sample_count: self.config.sample_count,
                aspect_ratio: &self.config.aspect_ratio,
            },
        };
        Request::post(self.config.predict_url()).json(&payload)
    }
}

impl<T, C> ImageGenerator<T, C>
where
    T: Transport,
    C: Classifier,
{
    /// Generate an image for `prompt`.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ImageError<T::Error>> {
        let generation = self.generate_inner(prompt);
        #[cfg(feature = "tracing")]
        let generation = tracing::Instrument::instrument(
            generation,
            tracing::debug_span!("generate_image", model = %self.config.model),
        );
        generation.await
    }

    async fn generate_inner(&self, prompt: &str) -> Result<GeneratedImage, ImageError<T::Error>> {
        let request = self.request_for(prompt).map_err(ImageError::Encode)?;

        let response = self
            .executor
            .execute_with_hooks(&request, |event: &RetryEvent<'_, T::Error>| {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempt = event.attempt,
                    next_delay_ms = event.next_delay.as_millis() as u64,
                    status = ?event.cause.status(),
                    "retrying image generation"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = event;
            })
            .await
            .map_err(ImageError::Request)?;

        parse_reply(&response, prompt)
    }

    /// Generate an image for `prompt` and display the outcome in `slot`.
    pub async fn render_into<S>(&self, slot: &mut S, prompt: &str)
    where
        S: ImageSlot + ?Sized,
        T::Error: fmt::Display,
    {
        slot.show_loading();

        match self.generate(prompt).await {
            Ok(image) => slot.show_image(&image),
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(prompt, error = %error, "image generation failed");
                slot.show_error(&error.user_message());
            }
        }
    }

    /// Populate every slot with the image for its prompt.
    ///
    /// All generations run concurrently and independently; one failing does
    /// not affect the others.
    pub async fn render_all<'a, S, I>(&self, jobs: I)
    where
        S: ImageSlot + ?Sized + 'a,
        I: IntoIterator<Item = (&'a mut S, &'a str)>,
        T::Error: fmt::Display,
    {
        join_all(
            jobs.into_iter()
                .map(|(slot, prompt)| self.render_into(slot, prompt)),
        )
        .await;
    }
}

fn parse_reply<E>(response: &Response, prompt: &str) -> Result<GeneratedImage, ImageError<E>> {
    let reply: PredictReply = serde_json::from_slice(&response.body).map_err(ImageError::Decode)?;

    let image = reply.predictions.into_iter().next().and_then(|prediction| {
        let base64 = prediction.bytes_base64_encoded.filter(|b| !b.is_empty())?;
        let mime_type = prediction
            .mime_type
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        Some(GeneratedImage::new(base64, mime_type, prompt))
    });

    image.ok_or_else(|| {
        ImageError::Api(
            reply
                .error
                .and_then(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string()),
        )
    })
}
