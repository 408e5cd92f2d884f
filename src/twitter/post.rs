use super::query_ids::Operation;
use super::TwitterClient;
use crate::error::{Result, TwitterError};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const CHUNK_SIZE: usize = 5 * 1024 * 1024;
pub(crate) const MAX_STATUS_POLLS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUpload {
    pub media_id: String,
    pub media_type: String,
    pub size: u64,
}

fn media_type_for(path: &Path) -> Result<(&'static str, &'static str)> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok(("image/jpeg", "tweet_image")),
        "png" => Ok(("image/png", "tweet_image")),
        "webp" => Ok(("image/webp", "tweet_image")),
        "gif" => Ok(("image/gif", "tweet_gif")),
        "mp4" => Ok(("video/mp4", "tweet_video")),
        _ => Err(TwitterError::InvalidInput(format!(
            "unsupported media type: {}",
            path.display()
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessingStep {
    Ready,
    /// Seconds to wait before polling STATUS again.
    Wait(u64),
}

/// Read `processing_info` from a FINALIZE or STATUS response.
fn processing_step(status: &Value) -> Result<ProcessingStep> {
    let Some(info) = status.get("processing_info") else {
        return Ok(ProcessingStep::Ready);
    };
    match info.get("state").and_then(Value::as_str) {
        Some("succeeded") | None => Ok(ProcessingStep::Ready),
        Some("failed") => {
            let message = info
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("media processing failed");
            Err(TwitterError::Api {
                messages: vec![message.to_string()],
                codes: Vec::new(),
            })
        }
        Some(_) => Ok(ProcessingStep::Wait(
            info.get("check_after_secs")
                .and_then(Value::as_u64)
                .unwrap_or(1),
        )),
    }
}

fn create_tweet_variables(text: &str, reply_to: Option<&str>, media_ids: &[String]) -> Value {
    let media_entities: Vec<Value> = media_ids
        .iter()
        .map(|id| json!({ "media_id": id, "tagged_users": [] }))
        .collect();
    let mut variables = json!({
        "tweet_text": text,
        "dark_request": false,
        "media": { "media_entities": media_entities, "possibly_sensitive": false },
        "semantic_annotation_ids": []
    });
    if let Some(reply_to) = reply_to {
        variables["reply"] = json!({
            "in_reply_to_tweet_id": reply_to,
            "exclude_reply_user_ids": []
        });
    }
    variables
}

impl TwitterClient {
    /// Post a tweet; returns the new tweet id.
    pub async fn tweet(&self, text: &str, media_ids: &[String]) -> Result<String> {
        self.create_tweet(text, None, media_ids).await
    }

    pub async fn reply(&self, text: &str, in_reply_to: &str, media_ids: &[String]) -> Result<String> {
        self.create_tweet(text, Some(in_reply_to), media_ids).await
    }

    async fn create_tweet(&self, text: &str, reply_to: Option<&str>, media_ids: &[String]) -> Result<String> {
        if text.trim().is_empty() {
            return Err(TwitterError::InvalidInput("tweet text is empty".to_string()));
        }

        let result = self
            .graphql_post(
                Operation::CreateTweet,
                create_tweet_variables(text, reply_to, media_ids),
                super::features::timeline_features(),
            )
            .await
            .and_then(|body| {
                match body
                    .pointer("/data/create_tweet/tweet_results/result/rest_id")
                    .and_then(Value::as_str)
                {
                    Some(id) => Ok(id.to_string()),
                    None => Err(super::parse::graphql_errors(&body).unwrap_or_else(|| {
                        TwitterError::Parse("CreateTweet returned no tweet id".to_string())
                    })),
                }
            });

        match result {
            Err(e) if e.is_automation_block() => {
                warn!("GraphQL posting was flagged as automated, retrying via statuses/update");
                self.legacy_update(text, reply_to, media_ids).await
            }
            other => other,
        }
    }

    /// The REST 1.1 endpoint the web client used before CreateTweet.
    async fn legacy_update(&self, text: &str, reply_to: Option<&str>, media_ids: &[String]) -> Result<String> {
        let mut form = vec![("status", text.to_string())];
        if let Some(reply_to) = reply_to {
            form.push(("in_reply_to_status_id", reply_to.to_string()));
            form.push(("auto_populate_reply_metadata", "true".to_string()));
        }
        if !media_ids.is_empty() {
            form.push(("media_ids", media_ids.join(",")));
        }
        let body = self.rest_post_form("statuses/update.json", &form).await?;
        if let Some(err) = super::parse::graphql_errors(&body) {
            return Err(err);
        }
        body.get("id_str")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TwitterError::Parse("statuses/update returned no id".to_string()))
    }

    /// Chunked INIT / APPEND / FINALIZE upload, polling while the server processes it.
    pub async fn upload_media(&self, path: &Path) -> Result<MediaUpload> {
        let (media_type, category) = media_type_for(path)?;
        let bytes = tokio::fs::read(path).await?;
        let size = bytes.len() as u64;
        let upload_url = self.endpoints.upload.as_str();

        let init = self
            .send_json(self.request(Method::POST, upload_url).form(&[
                ("command", "INIT".to_string()),
                ("total_bytes", size.to_string()),
                ("media_type", media_type.to_string()),
                ("media_category", category.to_string()),
            ]))
            .await?;
        let media_id = init
            .get("media_id_string")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TwitterError::Parse("media INIT returned no media_id".to_string()))?;
        debug!(%media_id, size, "media upload initialised");

        for (index, chunk) in bytes.chunks(CHUNK_SIZE).enumerate() {
            let form = Form::new()
                .text("command", "APPEND")
                .text("media_id", media_id.clone())
                .text("segment_index", index.to_string())
                .part("media", Part::bytes(chunk.to_vec()).file_name("blob"));
            self.send_json(self.request(Method::POST, upload_url).multipart(form))
                .await?;
        }

        let mut status = self
            .send_json(self.request(Method::POST, upload_url).form(&[
                ("command", "FINALIZE".to_string()),
                ("media_id", media_id.clone()),
            ]))
            .await?;

        let mut polls = 0;
        loop {
            match processing_step(&status)? {
                ProcessingStep::Ready => break,
                ProcessingStep::Wait(_) if polls >= MAX_STATUS_POLLS => {
                    return Err(TwitterError::Api {
                        messages: vec![format!("media {} processing timed out", media_id)],
                        codes: Vec::new(),
                    });
                }
                ProcessingStep::Wait(secs) => {
                    polls += 1;
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    let url = format!("{}?command=STATUS&media_id={}", upload_url, media_id);
                    status = self.send_json(self.request(Method::GET, &url)).await?;
                }
            }
        }

        info!(%media_id, "media uploaded");
        Ok(MediaUpload {
            media_id,
            media_type: media_type.to_string(),
            size,
        })
    }
}
