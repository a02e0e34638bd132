use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Request rejected by the service's access control (quota).
pub const CODE_DENIED_REQUEST: &str = "DeniedRequest";
/// Per-user request rate exceeded.
pub const CODE_THROTTLING_USER: &str = "Throttling.User";
/// Search `Start` lies beyond the last result.
pub const CODE_INVALID_START_PARAMETER: &str = "InvalidStartParameter";

/// Body the service returns alongside a non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceFault {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

impl fmt::Display for ServiceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code '{}' request '{}'", self.code, self.request_id)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("service responded with HTTP {status}: {fault}")]
    Service { status: u16, fault: ServiceFault },

    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn service(status: u16, code: &str, message: &str) -> Self {
        RemoteError::Service {
            status,
            fault: ServiceFault {
                code: code.to_string(),
                message: message.to_string(),
                request_id: String::new(),
            },
        }
    }

    /// Decoded fault body, if the service answered at all.
    pub fn fault(&self) -> Option<&ServiceFault> {
        match self {
            RemoteError::Service { fault, .. } => Some(fault),
            RemoteError::Transport(_) => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        self.fault().map(|f| f.code.as_str())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.code(), Some(CODE_DENIED_REQUEST) | Some(CODE_THROTTLING_USER))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddImageRequest {
    pub instance_name: String,
    pub pic_name: String,
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u32>,
    pub pic_content: String,
    pub str_attr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteImageRequest {
    pub instance_name: String,
    pub pic_name: String,
    pub product_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchImageRequest {
    pub instance_name: String,
    pub pic_content: String,
    #[serde(rename = "Type")]
    pub search_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u32>,
    pub filter: String,
    pub start: i64,
    pub num: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SearchHead {
    pub docs_found: i64,
    pub docs_return: i64,
    pub search_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Auction {
    pub product_id: String,
    pub pic_name: String,
    pub category_id: Option<u32>,
    pub str_attr: Option<String>,
    pub sort_expr_values: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SearchImageResponse {
    pub head: SearchHead,
    pub auctions: Vec<Auction>,
    pub request_id: String,
}

/// The remote image-indexing service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageSearchService: Send + Sync {
    async fn add_image(&self, request: AddImageRequest) -> Result<(), RemoteError>;
    async fn delete_image(&self, request: DeleteImageRequest) -> Result<(), RemoteError>;
    async fn search_image(
        &self,
        request: SearchImageRequest,
    ) -> Result<SearchImageResponse, RemoteError>;
}
