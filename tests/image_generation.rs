//! Integration tests for the image generation client
//!
//! Each slot gets its own scripted peer so the concurrent generations cannot
//! steal each other's outcomes.

#![cfg(feature = "imagen")]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use persevere::imagen::{
    ImageGenConfig, ImageGenerator, FALLBACK_ERROR_MESSAGE, LOADING_ERROR_MESSAGE,
};
use persevere::testing::{RecordingSlot, ScriptedError, SlotEvent};
use persevere::{BackoffPolicy, Request, Response, Transport};

/// Routes each request to a per-prompt script.
#[derive(Default)]
struct PromptRouter {
    scripts: Mutex<HashMap<String, Vec<Result<Response, ScriptedError>>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl PromptRouter {
    fn route(self, prompt: &str, mut outcomes: Vec<Result<Response, ScriptedError>>) -> Self {
        outcomes.reverse();
        self.scripts
            .lock()
            .unwrap()
            .insert(prompt.to_string(), outcomes);
        self
    }

    fn calls_for(&self, prompt: &str) -> u32 {
        self.calls.lock().unwrap().get(prompt).copied().unwrap_or(0)
    }
}

impl Transport for PromptRouter {
    type Error = ScriptedError;

    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, ScriptedError>> + Send {
        let body: serde_json::Value =
            serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap();
        let prompt = body["instances"]["prompt"].as_str().unwrap().to_string();

        *self.calls.lock().unwrap().entry(prompt.clone()).or_default() += 1;
        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&prompt)
            .and_then(|script| script.pop())
            .unwrap_or_else(|| Err(ScriptedError::new("unrouted prompt")));

        std::future::ready(outcome)
    }
}

fn image_reply(payload: &str) -> Result<Response, ScriptedError> {
    Ok(Response::new(200).with_body(format!(
        r#"{{"predictions":[{{"bytesBase64Encoded":"{}"}}]}}"#,
        payload
    )))
}

#[tokio::test(start_paused = true)]
async fn test_render_all_populates_every_slot_independently() {
    let router = PromptRouter::default()
        .route("harbor", vec![Ok(Response::new(429)), image_reply("aGFyYm9y")])
        .route("forest", vec![Ok(Response::new(503))])
        .route("desert", vec![Ok(Response::new(200).with_body("{}"))])
        .route(
            "glacier",
            vec![
                Err(ScriptedError::new("reset")),
                Err(ScriptedError::new("reset")),
                Err(ScriptedError::new("reset")),
            ],
        );
    let generator = ImageGenerator::new(router, ImageGenConfig::default().with_api_key("k"));

    let mut harbor = RecordingSlot::new();
    let mut forest = RecordingSlot::new();
    let mut desert = RecordingSlot::new();
    let mut glacier = RecordingSlot::new();

    generator
        .render_all([
            (&mut harbor, "harbor"),
            (&mut forest, "forest"),
            (&mut desert, "desert"),
            (&mut glacier, "glacier"),
        ])
        .await;

    assert_eq!(
        harbor.events,
        vec![
            SlotEvent::Loading,
            SlotEvent::Image {
                data_url: "data:image/png;base64,aGFyYm9y".to_string(),
                alt: "harbor".to_string(),
            },
        ]
    );
    assert_eq!(
        forest.current(),
        Some(&SlotEvent::Error(LOADING_ERROR_MESSAGE.to_string()))
    );
    assert_eq!(
        desert.current(),
        Some(&SlotEvent::Error(format!("Error: {}", FALLBACK_ERROR_MESSAGE)))
    );
    assert_eq!(
        glacier.current(),
        Some(&SlotEvent::Error(LOADING_ERROR_MESSAGE.to_string()))
    );

    let router = generator.executor().transport();
    assert_eq!(router.calls_for("harbor"), 2);
    assert_eq!(router.calls_for("forest"), 1);
    assert_eq!(router.calls_for("desert"), 1);
    assert_eq!(router.calls_for("glacier"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_config_retry_policy_bounds_attempts() {
    let router = PromptRouter::default().route(
        "storm",
        vec![Ok(Response::new(429)), Ok(Response::new(429)), image_reply("x")],
    );
    let config = ImageGenConfig::default().with_retry(BackoffPolicy::default().with_max_attempts(2));
    let generator = ImageGenerator::new(router, config);

    let err = generator.generate("storm").await.unwrap_err();

    assert_eq!(err.to_string(), "API request failed with status 429");
    assert_eq!(generator.executor().transport().calls_for("storm"), 2);
}

#[cfg(feature = "tracing")]
mod logging {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_failure_is_logged() {
        let router = PromptRouter::default().route("void", vec![Ok(Response::new(404))]);
        let generator = ImageGenerator::new(router, ImageGenConfig::default());

        let mut slot = RecordingSlot::new();
        generator.render_into(&mut slot, "void").await;

        assert!(logs_contain("image generation failed"));
        assert!(logs_contain("status 404"));
    }
}
