use thiserror::Error;

pub type Result<T> = std::result::Result<T, PersistraError>;

#[derive(Debug, Error)]
pub enum PersistraError {
    #[error("No bean registered for role: {type_name}")]
    BeanNotFound { type_name: String },

    #[error("Failed to downcast bean: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Missing required component: {role}")]
    MissingComponent { role: String },

    #[error("Invalid value for '{key}': '{value}' ({message})")]
    InvalidProperty {
        key: String,
        value: String,
        message: String,
    },

    #[error("Entity manager factory is closed")]
    FactoryClosed,

    #[error("Unit of work {id} is already closed")]
    UnitOfWorkClosed { id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "sea-orm-db")]
impl From<sea_orm::DbErr> for PersistraError {
    fn from(err: sea_orm::DbErr) -> Self {
        // A real application would have more sophisticated error mapping
        PersistraError::Internal(format!("Database error: {}", err))
    }
}

impl axum::response::IntoResponse for PersistraError {
    fn into_response(self) -> axum::response::Response {
        // Every variant is a startup wiring or lifecycle fault; none carries
        // client-attributable meaning.
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            self.to_string(),
        )
            .into_response()
    }
}
