//! Intent dispatch: one submitted form, one store call.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{instrument, warn};

use timeboard_core::{Todo, TodoId, TodoStatus, ValidationError};
use timeboard_store::TodoRepo;

use crate::error::{log_store_failure, ApiError};

/// A validated mutation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Create {
        title: String,
        status: TodoStatus,
        description: String,
    },
    Delete {
        id: TodoId,
    },
    Update {
        id: TodoId,
        status: TodoStatus,
    },
}

/// What a successful intent answers with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Created(Todo),
    Success { success: bool },
}

impl Outcome {
    pub fn success() -> Self {
        Self::Success { success: true }
    }
}

/// Form values count as absent when missing or empty.
fn field<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

impl Intent {
    /// Parse the flat form mapping. `intent` selects the variant.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        match field(params, "intent") {
            Some("create") => {
                let title = field(params, "title").ok_or(ValidationError::EmptyTitle)?;
                let status = match field(params, "status") {
                    Some(s) => s.parse()?,
                    None => TodoStatus::default(),
                };
                Ok(Self::Create {
                    title: title.to_string(),
                    status,
                    description: field(params, "description").unwrap_or_default().to_string(),
                })
            }
            Some("delete") => {
                let id = field(params, "id").ok_or(ValidationError::MissingField("ID is required"))?;
                Ok(Self::Delete { id: id.parse()? })
            }
            Some("update") => {
                let (Some(id), Some(status)) = (field(params, "id"), field(params, "status")) else {
                    return Err(ValidationError::MissingField("ID and status are required").into());
                };
                Ok(Self::Update {
                    id: id.parse()?,
                    status: status.parse()?,
                })
            }
            _ => Err(ApiError::InvalidIntent),
        }
    }

    /// Raw id of the todo the intent targets, if any.
    pub fn todo_id(&self) -> Option<i64> {
        match self {
            Self::Create { .. } => None,
            Self::Delete { id } | Self::Update { id, .. } => Some(id.get()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Delete { .. } => "delete",
            Self::Update { .. } => "update",
        }
    }
}

/// Run exactly one store operation for the intent.
///
/// Store failures are logged here, under the span that names the intent and todo.
#[instrument(skip_all, fields(intent = intent.name(), todo_id = intent.todo_id()))]
pub fn dispatch(repo: &TodoRepo, intent: Intent) -> Result<Outcome, ApiError> {
    let result = match intent {
        Intent::Create {
            title,
            status,
            description,
        } => repo
            .create(&title, status, &description)
            .map(Outcome::Created),
        Intent::Delete { id } => repo.delete(id).map(|_| Outcome::success()),
        Intent::Update { id, status } => repo.set_status(id, status).map(|_| Outcome::success()),
    };
    result.map_err(ApiError::from).inspect_err(log_store_failure)
}

/// Parse and dispatch a raw form submission, logging rejections.
pub fn dispatch_params(
    repo: &TodoRepo,
    params: &HashMap<String, String>,
) -> Result<Outcome, ApiError> {
    let intent = Intent::from_params(params).inspect_err(|e| {
        warn!(
            intent = params.get("intent").map(String::as_str).unwrap_or(""),
            error = %e,
            "rejected intent"
        );
    })?;
    dispatch(repo, intent)
}
