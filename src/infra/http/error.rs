use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{AppError, ErrorReport};

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// JSON error response carrying an [`ErrorReport`] for the logging middleware.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: ErrorReport,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        let status = error.status_code();
        // Validation details are safe to echo; everything else stays in the logs.
        let hint = match &error {
            AppError::Domain(inner @ crate::domain::error::DomainError::Validation { .. }) => {
                Some(inner.to_string())
            }
            AppError::Domain(inner @ crate::domain::error::DomainError::NotFound { .. }) => {
                Some(inner.to_string())
            }
            AppError::Validation(message) => Some(message.clone()),
            _ => None,
        };
        Self {
            status,
            code: error.code(),
            message: error.presentation_message(),
            hint,
            report: ErrorReport::from_error("infra::http::api_error", status, &error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::DomainError;

    #[test]
    fn not_found_carries_entity_hint() {
        let error = ApiError::from(AppError::from(DomainError::book_not_found(9)));
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.hint.as_deref(), Some("book #9 not found"));
    }

    #[test]
    fn response_has_report_extension() {
        let response =
            ApiError::from(AppError::from(DomainError::validation("rating", "too high")))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages[0], "invalid `rating`: too high");
    }
}
