use super::Context;
use crate::twitter::tweet_id_from_input;
use anyhow::{bail, Context as _, Result};
use serde_json::json;
use std::path::PathBuf;

const MAX_MEDIA: usize = 4;

pub async fn tweet(ctx: &Context, text: &str, reply_to: Option<&str>, media: &[PathBuf]) -> Result<()> {
    if media.len() > MAX_MEDIA {
        bail!("At most {} media attachments are allowed", MAX_MEDIA);
    }
    let reply_to = reply_to.map(tweet_id_from_input).transpose()?;
    let client = ctx.client().await?;

    let mut media_ids = Vec::with_capacity(media.len());
    for path in media {
        let upload = client
            .upload_media(path)
            .await
            .with_context(|| format!("Failed to upload {}", path.display()))?;
        media_ids.push(upload.media_id);
    }

    let id = match &reply_to {
        Some(parent) => client.reply(text, parent, &media_ids).await?,
        None => client.tweet(text, &media_ids).await?,
    };
    let url = format!("https://x.com/i/status/{}", id);

    if ctx.printer.json {
        return ctx.printer.print_json(&json!({ "id": id, "url": url }));
    }
    match reply_to {
        Some(parent) => ctx.printer.success(&format!("Replied to {}: {}", parent, url)),
        None => ctx.printer.success(&format!("Tweeted: {}", url)),
    }
    Ok(())
}

pub async fn unbookmark(ctx: &Context, inputs: &[String]) -> Result<()> {
    let ids = inputs
        .iter()
        .map(|input| tweet_id_from_input(input))
        .collect::<Result<Vec<_>, _>>()?;
    let client = ctx.client().await?;

    let mut removed = Vec::new();
    for id in ids {
        client
            .unbookmark(&id)
            .await
            .with_context(|| format!("Failed to remove bookmark {}", id))?;
        if !ctx.printer.json {
            ctx.printer.success(&format!("Removed bookmark {}", id));
        }
        removed.push(id);
    }
    if ctx.printer.json {
        ctx.printer.print_json(&json!({ "removed": removed }))?;
    }
    Ok(())
}
