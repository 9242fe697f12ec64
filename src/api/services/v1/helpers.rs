//! API v1 帮助函数

use actix_web::error::{InternalError, JsonPayloadError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use tracing::{error, warn};

use crate::errors::SeoHubError;
use crate::storage::Paginated;

use super::error_code::ErrorCode;
use super::types::{ApiResponse, PaginatedResponse, PaginationInfo};

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code: code as i32,
            message: message.into(),
            data,
        })
}

/// 构建成功响应
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
}

/// 201 Created
pub fn created_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::CREATED, ErrorCode::Success, "Created", Some(data))
}

/// 构建错误响应
pub fn error_response(status: StatusCode, error_code: ErrorCode, message: &str) -> HttpResponse {
    json_response::<()>(status, error_code, message, None)
}

/// 从 SeoHubError 构建错误响应（自动映射 HTTP 状态码和 ErrorCode）
pub fn error_from_seohub(err: &SeoHubError) -> HttpResponse {
    let status = err.http_status();
    if status.is_server_error() {
        error!("API error {}: {}", err.code(), err);
    } else {
        warn!("API error {}: {}", err.code(), err);
    }
    error_response(status, ErrorCode::from(err), err.message())
}

/// 统一 Result → HttpResponse 转换
///
/// 成功时返回 200 OK + JSON 数据，失败时自动映射 SeoHubError。
pub fn api_result<T, E>(result: Result<T, E>) -> HttpResponse
where
    T: Serialize,
    E: Into<SeoHubError>,
{
    match result {
        Ok(data) => success_response(data),
        Err(e) => error_from_seohub(&e.into()),
    }
}

/// 同 [`api_result`]，成功时返回 201
pub fn api_created<T, E>(result: Result<T, E>) -> HttpResponse
where
    T: Serialize,
    E: Into<SeoHubError>,
{
    match result {
        Ok(data) => created_response(data),
        Err(e) => error_from_seohub(&e.into()),
    }
}

/// 分页列表响应，`pagination` 与 `data` 同级
pub fn api_paginated<T, E>(result: Result<Paginated<T>, E>) -> HttpResponse
where
    T: Serialize,
    E: Into<SeoHubError>,
{
    match result {
        Ok(page) => {
            let pagination = PaginationInfo::from(&page);
            HttpResponse::Ok()
                .append_header(("Content-Type", "application/json; charset=utf-8"))
                .json(PaginatedResponse {
                    code: ErrorCode::Success as i32,
                    message: "OK".to_string(),
                    data: page.items,
                    pagination,
                })
        }
        Err(e) => error_from_seohub(&e.into()),
    }
}

/// JSON body 解析失败时返回统一信封
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(json_error_handler)
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = match &err {
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorCode::PayloadTooLarge,
                "Request body too large",
            )
        }
        JsonPayloadError::ContentType => error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorCode::BadRequest,
            "Expected Content-Type: application/json",
        ),
        other => error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationFailed,
            &format!("Invalid JSON body: {}", other),
        ),
    };
    InternalError::from_response(err, response).into()
}

/// Query 参数解析失败时返回统一信封
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(query_error_handler)
}

fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = error_response(
        StatusCode::BAD_REQUEST,
        ErrorCode::ValidationFailed,
        &format!("Invalid query parameters: {}", err),
    );
    InternalError::from_response(err, response).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_rt::test]
    async fn test_api_result_ok() {
        let resp = api_result::<_, SeoHubError>(Ok("hello"));
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["code"], 0);
        assert_eq!(v["data"], "hello");
    }

    #[actix_rt::test]
    async fn test_api_result_maps_error() {
        let resp = api_result::<(), _>(Err(SeoHubError::invalid_transition("nope")));
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["code"], ErrorCode::InvalidTransition as i32);
        assert_eq!(v["message"], "nope");
        assert!(v.get("data").is_none());
    }

    #[actix_rt::test]
    async fn test_api_paginated_shape() {
        let page = Paginated::new(vec![1, 2], 1, 2, 5);
        let resp = api_paginated::<_, SeoHubError>(Ok(page));
        let body = to_bytes(resp.into_body()).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["data"], serde_json::json!([1, 2]));
        assert_eq!(v["pagination"]["total"], 5);
        assert_eq!(v["pagination"]["total_pages"], 3);
    }
}
