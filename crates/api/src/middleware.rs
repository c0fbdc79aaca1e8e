use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use hotelmenu_core::UserId;

use crate::app::errors::json_error;
use crate::context::RequesterContext;

/// Header the gateway sets to the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn requester_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let requester = match extract_requester(req.headers()) {
        Ok(r) => r,
        Err(message) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_requester", message);
        }
    };

    req.extensions_mut().insert(requester);
    next.run(req).await
}

fn extract_requester(headers: &HeaderMap) -> Result<RequesterContext, &'static str> {
    let Some(header) = headers.get(USER_ID_HEADER) else {
        return Ok(RequesterContext::anonymous());
    };

    let raw = header
        .to_str()
        .map_err(|_| "X-User-Id must be visible ASCII")?
        .trim();
    if raw.is_empty() {
        return Ok(RequesterContext::anonymous());
    }

    let user_id: UserId = raw.parse().map_err(|_| "X-User-Id must be a UUID")?;
    Ok(RequesterContext::user(user_id))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn missing_header_is_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(extract_requester(&headers).unwrap().user_id(), None);
    }

    #[test]
    fn parses_user_id() {
        let id = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(extract_requester(&headers).unwrap().user_id(), Some(id));
    }

    #[test]
    fn rejects_non_uuid() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("alice"));
        assert!(extract_requester(&headers).is_err());
    }
}
