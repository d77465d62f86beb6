//! Caption generation seam.
//!
//! The generator itself lives outside this crate. Whatever it does, the engine
//! only ever sees a string: missing credentials and failures both collapse
//! into fixed fallback captions.

use anyhow::Result;
use async_trait::async_trait;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const NO_CREDENTIAL_CAPTION: &str = "Add an API key to develop captions";
pub const FAILED_CAPTION: &str = "Lost in the darkroom";

#[async_trait]
pub trait CaptionService: Send + Sync {
    /// Short text describing the image in `payload` (a data URI).
    async fn generate(&self, payload: &str) -> Result<String>;
}

pub async fn caption_or_fallback(service: Option<&dyn CaptionService>, payload: &str) -> String {
    let Some(service) = service else {
        return NO_CREDENTIAL_CAPTION.to_string();
    };

    match service.generate(payload).await {
        Ok(text) => {
            let trimmed = text.trim().trim_matches('"').trim();
            if trimmed.is_empty() {
                FAILED_CAPTION.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Err(err) => {
            log_warn!("caption generation failed: {err:#}");
            FAILED_CAPTION.to_string()
        }
    }
}
