use agora_shared::{
    CastVote, CreateReply, DeleteReceipt, EditReceipt, EditReply, ReactionReceipt, ReplyReceipt,
    Target, ThreadSnapshot, ToggleReaction, VoteReceipt,
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{ThreadError, ThreadResult};
use crate::services::{Persistence, Viewer};

/// JSON-over-HTTP client for the forum API.
#[derive(Debug, Clone)]
pub struct HttpPersistence {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

impl HttpPersistence {
    pub fn new(config: &Config) -> ThreadResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("agora-discussion")
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        viewer: Option<&Viewer>,
        target: Target,
    ) -> ThreadResult<T> {
        let req = match viewer {
            Some(v) => req.bearer_auth(&v.token),
            None => req,
        };

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(%status, %target, "forum API rejected request");
            return Err(status_error(status, target, &body));
        }

        resp.json().await.map_err(ThreadError::from)
    }
}

/// Maps a non-success response onto the error taxonomy.
pub fn status_error(status: StatusCode, target: Target, body: &str) -> ThreadError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                format!("API error: {status}")
            } else {
                body.trim().to_string()
            }
        });

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ThreadError::Validation(message)
        }
        StatusCode::UNAUTHORIZED => ThreadError::AuthenticationRequired,
        StatusCode::FORBIDDEN => ThreadError::PermissionDenied(message),
        StatusCode::NOT_FOUND | StatusCode::GONE => ThreadError::NotFound(target),
        StatusCode::CONFLICT => ThreadError::Conflict(message),
        _ => ThreadError::Network(message),
    }
}

#[async_trait]
impl Persistence for HttpPersistence {
    /// GET /api/forum/threads/:id
    async fn fetch_thread(
        &self,
        thread_id: i64,
        viewer: Option<&Viewer>,
    ) -> ThreadResult<ThreadSnapshot> {
        let req = self
            .client
            .get(self.url(&format!("/api/forum/threads/{thread_id}")));
        self.send(req, viewer, Target::Thread(thread_id)).await
    }

    /// POST /api/forum/threads/:id/replies
    async fn create_reply(
        &self,
        viewer: &Viewer,
        thread_id: i64,
        request: &CreateReply,
    ) -> ThreadResult<ReplyReceipt> {
        let target = match request.parent_id {
            Some(parent) => Target::Reply(parent),
            None => Target::Thread(thread_id),
        };
        let req = self
            .client
            .post(self.url(&format!("/api/forum/threads/{thread_id}/replies")))
            .json(request);
        self.send(req, Some(viewer), target).await
    }

    /// PUT /api/forum/replies/:id
    async fn edit_reply(
        &self,
        viewer: &Viewer,
        reply_id: i64,
        request: &EditReply,
    ) -> ThreadResult<EditReceipt> {
        let req = self
            .client
            .put(self.url(&format!("/api/forum/replies/{reply_id}")))
            .json(request);
        self.send(req, Some(viewer), Target::Reply(reply_id)).await
    }

    /// DELETE /api/forum/replies/:id
    async fn delete_reply(&self, viewer: &Viewer, reply_id: i64) -> ThreadResult<DeleteReceipt> {
        let req = self
            .client
            .delete(self.url(&format!("/api/forum/replies/{reply_id}")));
        self.send(req, Some(viewer), Target::Reply(reply_id)).await
    }

    /// POST /api/votes — toggles on a repeated direction
    async fn vote(&self, viewer: &Viewer, request: &CastVote) -> ThreadResult<VoteReceipt> {
        let req = self.client.post(self.url("/api/votes")).json(request);
        let target = Target::new(request.target_type, request.target_id);
        self.send(req, Some(viewer), target).await
    }

    /// POST /api/reactions — toggles the viewer's emoji
    async fn react(
        &self,
        viewer: &Viewer,
        request: &ToggleReaction,
    ) -> ThreadResult<ReactionReceipt> {
        let req = self.client.post(self.url("/api/reactions")).json(request);
        let target = Target::new(request.target_type, request.target_id);
        self.send(req, Some(viewer), target).await
    }
}
