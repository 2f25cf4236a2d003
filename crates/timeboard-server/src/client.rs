//! HTTP client for the todo surface, plus a read-through board cache.
//!
//! `BoardView` never edits its cache locally: every mutation is followed by a
//! fresh `GET /todos`, so what it shows is always a Store read.

use serde::Deserialize;
use timeboard_core::{Board, Todo, TodoId, TodoStatus};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct SuccessBody {
    success: bool,
}

/// Thin wrapper over the `/todos` endpoints.
#[derive(Clone)]
pub struct TodoClient {
    http: reqwest::Client,
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list(&self) -> Result<Vec<Todo>, ClientError> {
        let resp = self.http.get(self.url("/todos")).send().await?;
        decode(resp).await
    }

    pub async fn board(&self) -> Result<Board, ClientError> {
        let resp = self.http.get(self.url("/board")).send().await?;
        decode(resp).await
    }

    pub async fn create(
        &self,
        title: &str,
        status: TodoStatus,
        description: &str,
    ) -> Result<Todo, ClientError> {
        self.submit(&[
            ("intent", "create"),
            ("title", title),
            ("status", status.as_str()),
            ("description", description),
        ])
        .await
    }

    pub async fn delete(&self, id: TodoId) -> Result<bool, ClientError> {
        let id = id.to_string();
        let body: SuccessBody = self.submit(&[("intent", "delete"), ("id", id.as_str())]).await?;
        Ok(body.success)
    }

    pub async fn update(&self, id: TodoId, status: TodoStatus) -> Result<bool, ClientError> {
        let id = id.to_string();
        let body: SuccessBody = self
            .submit(&[("intent", "update"), ("id", id.as_str()), ("status", status.as_str())])
            .await?;
        Ok(body.success)
    }

    async fn submit<T: serde::de::DeserializeOwned>(
        &self,
        form: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let resp = self.http.post(self.url("/todos")).form(form).send().await?;
        decode(resp).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Client-side board that is only ever filled from Store reads.
pub struct BoardView {
    client: TodoClient,
    board: Board,
}

impl BoardView {
    /// Fetch the current list and build the initial board.
    pub async fn load(client: TodoClient) -> Result<Self, ClientError> {
        let board = Board::from_todos(client.list().await?);
        Ok(Self { client, board })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.board = Board::from_todos(self.client.list().await?);
        Ok(())
    }

    /// Typed entry. Blank input sends nothing and returns `None`.
    pub async fn add(&mut self, title: &str, status: TodoStatus) -> Result<Option<TodoId>, ClientError> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }
        let created = self.client.create(title, status, "").await?;
        self.refresh().await?;
        Ok(Some(created.id))
    }

    /// Delete button.
    pub async fn remove(&mut self, id: TodoId) -> Result<(), ClientError> {
        self.client.delete(id).await?;
        self.refresh().await
    }

    /// Drop onto a column.
    pub async fn move_to(&mut self, id: TodoId, status: TodoStatus) -> Result<(), ClientError> {
        self.client.update(id, status).await?;
        self.refresh().await
    }
}
