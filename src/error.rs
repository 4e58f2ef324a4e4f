use crate::entity::EntityId;
use axum::http::StatusCode;

pub type LightResult<T> = Result<T, LightError>;

/// Errors surfaced by the entity tree, propagation and render paths.
///
/// Display strings are returned verbatim in `{"error": ...}` API bodies.
#[derive(thiserror::Error, Debug)]
pub enum LightError {
    #[error("Missing data: {0}")]
    MissingField(String),

    #[error("Entity not found")]
    EntityNotFound(EntityId),

    #[error("Parent entity not found")]
    ParentNotFound(EntityId),

    #[error("Invalid parent entity: cyclic relationship detected")]
    CyclicRelationship {
        entity: Option<EntityId>,
        parent: EntityId,
    },

    #[error("{reason}")]
    InvalidColor { reason: String },

    #[error("Invalid range: {reason}")]
    InvalidRange { reason: String },

    #[error("Corrupt entity hierarchy: {0}")]
    CorruptHierarchy(String),

    #[error("Hardware fault: {0}")]
    HardwareFault(String),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl LightError {
    pub fn invalid_color(reason: impl Into<String>) -> Self {
        Self::InvalidColor {
            reason: reason.into(),
        }
    }

    pub fn invalid_range(reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LightError::MissingField(_)
            | LightError::CyclicRelationship { .. }
            | LightError::InvalidColor { .. }
            | LightError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            LightError::EntityNotFound(_) | LightError::ParentNotFound(_) => StatusCode::NOT_FOUND,
            LightError::HardwareFault(_) => StatusCode::SERVICE_UNAVAILABLE,
            LightError::CorruptHierarchy(_) | LightError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
