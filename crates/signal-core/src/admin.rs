//! Contract with the privileged admin function.
//!
//! Every op needs a bearer credential. All ops except `delete_self` are
//! restricted to the master identity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AdminRequest {
    ListUsers,
    DeleteUser { user_id: String },
    DeleteSelf,
    DeleteSave { user_id: String },
}

impl AdminRequest {
    pub fn name(&self) -> &'static str {
        match self {
            AdminRequest::ListUsers => "list_users",
            AdminRequest::DeleteUser { .. } => "delete_user",
            AdminRequest::DeleteSelf => "delete_self",
            AdminRequest::DeleteSave { .. } => "delete_save",
        }
    }

    fn target(&self) -> Option<&str> {
        match self {
            AdminRequest::DeleteUser { user_id } | AdminRequest::DeleteSave { user_id } => Some(user_id),
            AdminRequest::ListUsers | AdminRequest::DeleteSelf => None,
        }
    }
}

/// The identity behind a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("server error: {0}")]
    Server(String),
}

/// Error body the admin function returns on failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    error: String,
}

impl AdminError {
    pub fn status(&self) -> u16 {
        match self {
            AdminError::Unauthorized(_) => 401,
            AdminError::Forbidden(_) => 403,
            AdminError::BadRequest(_) => 400,
            AdminError::Server(_) => 500,
        }
    }

    /// Map a failed HTTP response back into a typed error.
    pub fn from_response(status: u16, body: &str) -> AdminError {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("status {}", status));
        match status {
            401 => AdminError::Unauthorized(message),
            403 => AdminError::Forbidden(message),
            400 => AdminError::BadRequest(message),
            _ => AdminError::Server(message),
        }
    }

    /// JSON body for this error.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

/// Decide whether `caller` may run `request`.
pub fn authorize(request: &AdminRequest, caller: Option<&Caller>, master_id: &str) -> Result<(), AdminError> {
    let Some(caller) = caller else {
        return Err(AdminError::Unauthorized("missing bearer token".to_string()));
    };
    if let Some(target) = request.target() {
        if target.trim().is_empty() {
            return Err(AdminError::BadRequest(format!("{} needs a user_id", request.name())));
        }
    }
    if matches!(request, AdminRequest::DeleteSelf) {
        return Ok(());
    }
    if master_id.is_empty() || caller.user_id != master_id {
        log::warn!("admin: {} refused for {}", request.name(), caller.user_id);
        return Err(AdminError::Forbidden(format!("{} requires the master account", request.name())));
    }
    Ok(())
}
