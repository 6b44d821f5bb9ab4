//! Transient user notices
//!
//! Every column or edit outcome can be turned into a short notice that UI
//! collaborators display and let expire.

use crate::{ColumnError, EditError, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: Timestamp,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    /// Notice for an operation result; `success` builds the success message.
    pub fn from_result<T, E>(result: &Result<T, E>, success: impl FnOnce(&T) -> String) -> Self
    where
        for<'a> Notice: From<&'a E>,
    {
        match result {
            Ok(value) => Notice::success(success(value)),
            Err(err) => Notice::from(err),
        }
    }
}

impl From<&ColumnError> for Notice {
    fn from(err: &ColumnError) -> Self {
        // Validation problems are the user's to fix; the rest are failures.
        let level = if err.is_validation() || matches!(err, ColumnError::DuplicateKey { .. }) {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Error
        };
        Notice::new(level, err.user_message())
    }
}

impl From<&EditError> for Notice {
    fn from(err: &EditError) -> Self {
        let level = match err {
            EditError::TypeMismatch { .. } | EditError::ReadOnlyField { .. } => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Notice::new(level, err.user_message())
    }
}
