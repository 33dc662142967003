use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

/// Everything that can stop a page from rendering.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to load geometry from {path:?}: {reason}")]
    GeometryLoad { path: PathBuf, reason: String },
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("failed to fetch status data: {0}")]
    RemoteFetch(String),
    #[error("status data is missing required column '{column}'")]
    Schema { column: String },
    #[error("invalid timestamp '{input}': {reason}")]
    TimestampParse { input: String, reason: String },
}

impl MapError {
    pub fn geometry(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MapError::GeometryLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MapError::GeometryLoad { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MapError::Authentication(_)
            | MapError::RemoteFetch(_)
            | MapError::Schema { .. }
            | MapError::TimestampParse { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for MapError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        error!(error = %self, status = status.as_u16(), "page render failed");

        let body = format!(
            r#"<!DOCTYPE html>
<html lang="ja">
<head><meta charset="UTF-8"><title>表示エラー</title></head>
<body>
<h1>地図を表示できませんでした</h1>
<p>{}</p>
</body>
</html>"#,
            crate::render::html_escape(&self.to_string())
        );

        (status, Html(body)).into_response()
    }
}
