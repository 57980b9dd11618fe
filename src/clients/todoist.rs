//! Todoist REST v2 client (comments and task descriptions only).

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{http_client, join_url, Comment, TaskClient};
use crate::config::TodoistConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "todoist";

/// HTTP client for Todoist
#[derive(Debug, Clone)]
pub struct TodoistClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TodoistClient {
    pub fn new(config: &TodoistConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: config.api_url.clone(),
            token: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::Api {
            service: SERVICE,
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TaskClient for TodoistClient {
    async fn comments(&self, task_id: &str) -> Result<Vec<Comment>> {
        tracing::debug!(task_id, "list comments");
        let request = self.http.get(self.url("comments")).query(&[("task_id", task_id)]);
        self.send_json(request).await
    }

    async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment> {
        tracing::debug!(task_id, "add comment");
        let body = serde_json::json!({ "task_id": task_id, "content": content });
        self.send_json(self.http.post(self.url("comments")).json(&body))
            .await
    }

    async fn update_comment(&self, comment_id: &str, content: &str) -> Result<Comment> {
        tracing::debug!(comment_id, "update comment");
        let body = serde_json::json!({ "content": content });
        let url = self.url(&format!("comments/{comment_id}"));
        self.send_json(self.http.post(url).json(&body)).await
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        tracing::debug!(comment_id, "delete comment");
        let url = self.url(&format!("comments/{comment_id}"));
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    async fn update_description(&self, task_id: &str, description: &str) -> Result<()> {
        tracing::debug!(task_id, "update task description");
        let body = serde_json::json!({ "description": description });
        let url = self.url(&format!("tasks/{task_id}"));
        self.send(self.http.post(url).json(&body)).await?;
        Ok(())
    }
}
