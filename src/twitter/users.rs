use super::features::{timeline_features, user_features};
use super::parse::{bottom_cursor, instructions_any, parse_timeline_users, parse_user_result};
use super::query_ids::Operation;
use super::types::{Page, TwitterUser};
use super::{normalize_handle, TwitterClient};
use crate::error::{Result, TwitterError};
use serde_json::{json, Value};

const USER_LIST_PATHS: [&str; 2] = [
    "/data/user/result/timeline/timeline/instructions",
    "/data/user/result/timeline_v2/timeline/instructions",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relationship {
    Following,
    Followers,
}

impl TwitterClient {
    pub async fn get_user(&self, handle: &str) -> Result<TwitterUser> {
        let handle = normalize_handle(handle);
        let body = self
            .graphql_get(
                Operation::UserByScreenName,
                json!({ "screen_name": handle, "withSafetyModeUserFields": true }),
                user_features(),
                Some(json!({ "withAuxiliaryUserLabels": false })),
            )
            .await?;
        body.pointer("/data/user/result")
            .and_then(parse_user_result)
            .ok_or_else(|| TwitterError::Parse(format!("user @{} not found", handle)))
    }

    pub async fn get_user_id(&self, handle: &str) -> Result<String> {
        Ok(self.get_user(handle).await?.id)
    }

    /// The account the session cookies belong to.
    pub async fn get_current_user(&self) -> Result<TwitterUser> {
        let settings = self.rest_get("account/settings.json").await?;
        let handle = settings
            .get("screen_name")
            .and_then(Value::as_str)
            .ok_or_else(|| TwitterError::Parse("account settings lack screen_name".to_string()))?;
        self.get_user(handle).await
    }

    pub async fn get_following(&self, user_id: &str, count: usize, cursor: Option<String>) -> Result<Page<TwitterUser>> {
        self.relationship_page(Relationship::Following, user_id, count, cursor)
            .await
    }

    pub async fn get_followers(&self, user_id: &str, count: usize, cursor: Option<String>) -> Result<Page<TwitterUser>> {
        self.relationship_page(Relationship::Followers, user_id, count, cursor)
            .await
    }

    async fn relationship_page(
        &self,
        relationship: Relationship,
        user_id: &str,
        count: usize,
        cursor: Option<String>,
    ) -> Result<Page<TwitterUser>> {
        let op = match relationship {
            Relationship::Following => Operation::Following,
            Relationship::Followers => Operation::Followers,
        };
        let mut variables = json!({
            "userId": user_id,
            "count": count,
            "includePromotedContent": false
        });
        if let Some(cursor) = cursor {
            variables["cursor"] = json!(cursor);
        }
        let body = self
            .graphql_get(op, variables, timeline_features(), None)
            .await?;
        let instructions = instructions_any(&body, &USER_LIST_PATHS);
        Ok(Page::new(
            parse_timeline_users(instructions),
            bottom_cursor(instructions),
        ))
    }

    pub async fn follow(&self, user_id: &str) -> Result<()> {
        self.friendship("friendships/create.json", user_id).await
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<()> {
        self.friendship("friendships/destroy.json", user_id).await
    }

    async fn friendship(&self, path: &str, user_id: &str) -> Result<()> {
        let body = self
            .rest_post_form(
                path,
                &[
                    ("user_id", user_id.to_string()),
                    ("skip_status", "true".to_string()),
                ],
            )
            .await?;
        if let Some(err) = super::parse::graphql_errors(&body) {
            return Err(err);
        }
        Ok(())
    }
}
