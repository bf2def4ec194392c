//! Fetch Error Types

use thiserror::Error;

/// Transport-level failures, classified into the message shown to the user
///
/// The `Display` output is the user-facing text; the raw transport detail is
/// only kept for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Backend rejected the credentials (401/403)
    #[error("Error de autorización. Verifique que su API Key sea correcta y que la tabla tenga una política de lectura (RLS) para acceso público.")]
    Unauthorized { status: u16 },

    /// Table endpoint does not exist (404)
    #[error("No se encontró la tabla '{table}'. Verifique que el nombre de la tabla sea correcto.")]
    TableNotFound { table: String },

    /// Any other failure: other statuses, connection errors, timeouts, bad bodies
    #[error("Ocurrió un error inesperado al contactar al servidor de datos. Revise los registros para más detalles.")]
    Unexpected { detail: String },
}

impl FetchError {
    /// Classify an HTTP error status
    pub fn from_status(status: u16, table: &str, detail: impl Into<String>) -> Self {
        match status {
            401 | 403 => FetchError::Unauthorized { status },
            404 => FetchError::TableNotFound {
                table: table.to_string(),
            },
            _ => FetchError::Unexpected {
                detail: detail.into(),
            },
        }
    }

    /// Message stored as the dashboard's last error
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
