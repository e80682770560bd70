use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::error;

pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    if response.status().is_server_error() {
        log_error_body(&method, &path, response).await
    } else {
        response
    }
}

/// Captures the error body for the log and rebuilds the response. The
/// original Content-Length no longer matches whatever body goes back out,
/// oversized-body case included, so it is dropped before anything else.
async fn log_error_body(method: &Method, path: &str, response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);

    let bytes = match to_bytes(body, 1024).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };
    let body_str = String::from_utf8_lossy(&bytes);

    error!(
        "Server error on {} {} - Status: {}, Body: {}",
        method, path, parts.status, body_str
    );

    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn oversized_error_body_drops_the_stale_content_length() {
        let big = vec![b'x'; 4096];
        let response = Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header(CONTENT_LENGTH, big.len())
            .body(Body::from(big))
            .unwrap();

        let rebuilt = log_error_body(&Method::GET, "/boom", response).await;

        assert_eq!(rebuilt.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(rebuilt.headers().get(CONTENT_LENGTH).is_none());
        let bytes = to_bytes(rebuilt.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn small_error_body_survives_the_rebuild() {
        let response = Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header(CONTENT_LENGTH, 5)
            .body(Body::from("oops!"))
            .unwrap();

        let rebuilt = log_error_body(&Method::POST, "/boom", response).await;

        let bytes = to_bytes(rebuilt.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"oops!");
    }
}
