// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT

/// Errors returned by the backing store, after the reasons the API server reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("ObjectNotFound")]
    ObjectNotFound,
    #[error("ObjectAlreadyExists")]
    ObjectAlreadyExists,
    #[error("BadRequest")]
    BadRequest,
    #[error("Conflict")]
    Conflict,
    #[error("Invalid")]
    Invalid,
    #[error("Forbidden")]
    Forbidden,
    #[error("InternalError")]
    InternalError,
    #[error("Timeout")]
    Timeout,
    #[error("ServerTimeout")]
    ServerTimeout,
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::ObjectNotFound)
    }
}

// kube_error_to_api_error translates the error from kube-rs APIs
// to the form that control functions branch on.
pub fn kube_error_to_api_error(error: &kube::Error) -> ApiError {
    match error {
        kube::Error::Api(error_resp) => match error_resp.reason.as_str() {
            "NotFound" => ApiError::ObjectNotFound,
            "AlreadyExists" => ApiError::ObjectAlreadyExists,
            "BadRequest" => ApiError::BadRequest,
            "Conflict" => ApiError::Conflict,
            "Invalid" => ApiError::Invalid,
            "Forbidden" => ApiError::Forbidden,
            "InternalError" => ApiError::InternalError,
            "Timeout" => ApiError::Timeout,
            "ServerTimeout" => ApiError::ServerTimeout,
            _ if error_resp.code == 404 => ApiError::ObjectNotFound,
            _ => ApiError::Other(error_resp.message.clone()),
        },
        _ => ApiError::Other(error.to_string()),
    }
}
