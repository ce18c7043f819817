//! Wire messages between a host and its worker.
//!
//! ```json
//! { "id": "w0-1", "sourceText": "\\section{A} text" }
//! { "id": "w0-1", "html": "<h1>A</h1><p>text</p>" }
//! { "id": "w0-2", "error": "input is 9000000 bytes, limit is 4194304" }
//! ```

use serde::{Deserialize, Serialize};
use texpaper_core::ParseError;

/// A document to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub id: String,
    pub source_text: String,
}

impl WorkerRequest {
    pub fn new(id: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_text: source_text.into(),
        }
    }
}

/// A diagnostic as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: String,
    pub kind: String,
    pub message: String,
}

impl From<&ParseError> for Diagnostic {
    fn from(error: &ParseError) -> Self {
        Self {
            stage: error.stage.as_str().to_string(),
            kind: error.kind.as_str().to_string(),
            message: error.message.clone(),
        }
    }
}

/// The answer to one [`WorkerRequest`], always echoing its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    Success {
        id: String,
        html: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        diagnostics: Vec<Diagnostic>,
    },
    Failure {
        id: String,
        error: String,
    },
}

impl WorkerResponse {
    pub fn id(&self) -> &str {
        match self {
            WorkerResponse::Success { id, .. } | WorkerResponse::Failure { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkerResponse::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_uses_camel_case() {
        let json = serde_json::to_string(&WorkerRequest::new("1", "x")).unwrap();
        assert_eq!(json, r#"{"id":"1","sourceText":"x"}"#);
    }

    #[test]
    fn success_without_diagnostics_omits_the_key() {
        let response = WorkerResponse::Success {
            id: "1".into(),
            html: "<p>x</p>".into(),
            diagnostics: Vec::new(),
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"id":"1","html":"<p>x</p>"}"#
        );
    }

    #[test]
    fn untagged_responses_are_told_apart() {
        let failure: WorkerResponse = serde_json::from_str(r#"{"id":"7","error":"boom"}"#).unwrap();
        assert_eq!(
            failure,
            WorkerResponse::Failure {
                id: "7".into(),
                error: "boom".into()
            }
        );

        let success: WorkerResponse = serde_json::from_str(r#"{"id":"8","html":""}"#).unwrap();
        assert!(success.is_success());
        assert_eq!(success.id(), "8");
    }
}
