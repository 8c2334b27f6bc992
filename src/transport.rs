//! Wire types and HTTP transport for the platform's import/export endpoints.

use crate::error::{Error, Result};
use crate::shard::Category;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Position of an export within one category. A negative component sum
/// means the server has nothing left to send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCursor {
    pub table: i64,
    pub row: i64,
    pub field: i64,
    pub array: i64,
}

impl ExportCursor {
    /// Widened so server-supplied components can never overflow.
    pub fn sum(&self) -> i128 {
        [self.table, self.row, self.field, self.array]
            .iter()
            .map(|&c| i128::from(c))
            .sum()
    }

    pub fn is_exhausted(&self) -> bool {
        self.sum() < 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub file_type: Category,
    pub cursor: ExportCursor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportOut {
    #[serde(rename = "jsonElements", default)]
    pub json_elements: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportResponse {
    #[serde(default)]
    pub out: ExportOut,
    #[serde(default)]
    pub cursor: Option<ExportCursor>,
    #[serde(default)]
    pub errors: Option<Value>,
}

impl ExportResponse {
    /// Server-reported errors, if any, rendered as text.
    pub fn error_text(&self) -> Option<String> {
        match &self.errors {
            None | Some(Value::Null) => None,
            Some(Value::Array(errors)) if errors.is_empty() => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(errors) => Some(errors.to_string()),
        }
    }
}

/// Service a transfer talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTarget {
    pub service: String,
    pub stage: String,
    pub token: Option<String>,
    pub workspace: Option<String>,
}

impl ServiceTarget {
    pub fn new<S: Into<String>, T: Into<String>>(service: S, stage: T) -> Self {
        ServiceTarget {
            service: service.into(),
            stage: stage.into(),
            token: None,
            workspace: None,
        }
    }
}

pub trait Transport {
    /// Fetches one page of `request_json` (`{"fileType", "cursor"}`).
    fn download(&self, target: &ServiceTarget, request_json: &str) -> Result<ExportResponse>;

    /// Sends the raw text of one shard. An empty list means success.
    fn upload(&self, target: &ServiceTarget, file_contents: &str) -> Result<Vec<Value>>;
}

pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// `endpoint` is the cluster base URL, e.g. `http://localhost:4466`.
    pub fn new<S: Into<String>>(endpoint: S) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("prisma-data/", env!("CARGO_PKG_VERSION")))
            .timeout(Option::<Duration>::None)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, target: &ServiceTarget, action: &str) -> String {
        let workspace = target
            .workspace
            .as_deref()
            .map(|w| format!("{}/", w))
            .unwrap_or_default();
        format!(
            "{}/{}{}/{}/{}",
            self.endpoint, workspace, target.service, target.stage, action
        )
    }

    fn post(&self, target: &ServiceTarget, action: &str, body: &str) -> Result<Value> {
        let url = self.url(target, action);
        log::debug!("POST {} ({} bytes)", url, body.len());

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(token) = &target.token {
            request = request.bearer_auth(token);
        }
        let text = request.send()?.text()?;
        log::debug!("response from {}: {}", url, text);

        serde_json::from_str(&text).map_err(|_| Error::MalformedResponse(text))
    }
}

impl Transport for HttpTransport {
    fn download(&self, target: &ServiceTarget, request_json: &str) -> Result<ExportResponse> {
        let value = self.post(target, "export", request_json)?;
        Ok(serde_json::from_value(value)?)
    }

    fn upload(&self, target: &ServiceTarget, file_contents: &str) -> Result<Vec<Value>> {
        match self.post(target, "import", file_contents)? {
            Value::Array(errors) => Ok(errors),
            Value::Object(object) if object.contains_key("errors") => {
                let pretty = serde_json::to_string_pretty(&Value::Object(object))?;
                Err(Error::UploadRejected(pretty))
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn target() -> ServiceTarget {
        ServiceTarget {
            token: Some("secret".into()),
            ..ServiceTarget::new("blog", "dev")
        }
    }

    #[test]
    fn cursor_sum_signals_exhaustion() {
        let cursor = ExportCursor {
            table: 1,
            row: 0,
            field: 0,
            array: -2,
        };
        assert_eq!(cursor.sum(), -1);
        assert!(cursor.is_exhausted());
        assert!(!ExportCursor::default().is_exhausted());
    }

    #[test]
    fn cursor_sum_does_not_overflow() {
        let huge = ExportCursor {
            table: i64::MAX,
            row: i64::MAX,
            field: 0,
            array: 0,
        };
        assert_eq!(huge.sum(), 2 * i128::from(i64::MAX));
        assert!(!huge.is_exhausted());

        let tiny = ExportCursor {
            table: i64::MIN,
            row: i64::MIN,
            field: 0,
            array: 0,
        };
        assert!(tiny.is_exhausted());
    }

    #[test]
    fn request_uses_wire_names() {
        let request = ExportRequest {
            file_type: Category::Lists,
            cursor: ExportCursor::default(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "fileType": "lists", "cursor": { "table": 0, "row": 0, "field": 0, "array": 0 } })
        );
    }

    #[test]
    fn builds_endpoint_urls() {
        let transport = HttpTransport::new("http://localhost:4466/").unwrap();
        assert_eq!(
            transport.url(&target(), "import"),
            "http://localhost:4466/blog/dev/import"
        );
        let in_workspace = ServiceTarget {
            workspace: Some("acme".into()),
            ..target()
        };
        assert_eq!(
            transport.url(&in_workspace, "export"),
            "http://localhost:4466/acme/blog/dev/export"
        );
    }

    #[test]
    fn uploads_raw_body_with_bearer_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/blog/dev/import")
            .match_header("authorization", "Bearer secret")
            .match_header("content-type", "application/json")
            .match_body(r#"{"valueType":"nodes","values":[]}"#)
            .with_body("[]")
            .create();

        let transport = HttpTransport::new(server.url()).unwrap();
        let errors = transport
            .upload(&target(), r#"{"valueType":"nodes","values":[]}"#)
            .unwrap();
        assert!(errors.is_empty());
        mock.assert();
    }

    #[test]
    fn upload_error_object_is_rejected() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/blog/dev/import")
            .with_body(r#"{"errors":[{"message":"Not authorized"}]}"#)
            .create();

        let transport = HttpTransport::new(server.url()).unwrap();
        let err = transport.upload(&target(), "{}").unwrap_err();
        assert!(matches!(err, Error::UploadRejected(text) if text.contains("Not authorized")));
    }

    #[test]
    fn upload_returns_server_error_list() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/blog/dev/import")
            .with_body(r#"["Failure inserting Post with id x1"]"#)
            .create();

        let transport = HttpTransport::new(server.url()).unwrap();
        let errors = transport.upload(&target(), "{}").unwrap();
        assert_eq!(errors, vec![json!("Failure inserting Post with id x1")]);
    }

    #[test]
    fn downloads_page() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/blog/dev/export")
            .match_body(Matcher::Json(json!({
                "fileType": "nodes",
                "cursor": { "table": 0, "row": 0, "field": 0, "array": 0 }
            })))
            .with_body(
                r#"{"out":{"jsonElements":[{"_typeName":"Post","id":"p1"}]},
                    "cursor":{"table":-1,"row":-1,"field":-1,"array":-1}}"#,
            )
            .create();

        let transport = HttpTransport::new(server.url()).unwrap();
        let request = serde_json::to_string(&ExportRequest {
            file_type: Category::Nodes,
            cursor: ExportCursor::default(),
        })
        .unwrap();
        let response = transport.download(&target(), &request).unwrap();
        assert_eq!(response.out.json_elements.len(), 1);
        assert!(response.cursor.unwrap().is_exhausted());
        assert_eq!(response.error_text(), None);
        mock.assert();
    }

    #[test]
    fn non_json_response_is_malformed() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/blog/dev/export")
            .with_status(502)
            .with_body("Bad Gateway")
            .create();

        let transport = HttpTransport::new(server.url()).unwrap();
        let err = transport.download(&target(), "{}").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(text) if text == "Bad Gateway"));
    }
}
