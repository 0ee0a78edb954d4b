use actix_web::HttpRequest;
use common::{RawAuthHeaders, RequestEnvelope};

/// Builds the verification envelope for an inbound request.
///
/// The signed path is the request path without its query string. Header
/// values that are not visible ASCII are treated as absent.
pub fn envelope_from_request(req: &HttpRequest) -> RequestEnvelope {
    let headers = RawAuthHeaders::from_pairs(
        req.headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
    );

    RequestEnvelope::new(req.method().as_str(), req.path(), headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::Method;
    use actix_web::test::TestRequest;

    #[test]
    fn test_envelope_carries_method_path_and_headers() {
        let req = TestRequest::default()
            .method(Method::POST)
            .uri("/api/rewrite?debug=1")
            .insert_header(("X-Device-Id", "dev1"))
            .insert_header(("X-Timestamp", "1700000000000"))
            .insert_header(("X-Nonce", "abc123"))
            .insert_header(("X-Signature", "deadbeef"))
            .insert_header(("X-Device-Secret", "s3cr3t"))
            .to_http_request();

        let envelope = envelope_from_request(&req);
        assert_eq!(envelope.method, "POST");
        assert_eq!(envelope.path, "/api/rewrite");
        assert_eq!(envelope.headers.device_id.as_deref(), Some("dev1"));
        assert_eq!(envelope.headers.timestamp.as_deref(), Some("1700000000000"));
        assert_eq!(envelope.headers.nonce.as_deref(), Some("abc123"));
        assert_eq!(envelope.headers.signature.as_deref(), Some("deadbeef"));
        assert_eq!(envelope.headers.device_secret.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn test_missing_headers_stay_empty() {
        let req = TestRequest::default()
            .method(Method::POST)
            .uri("/api/rewrite")
            .to_http_request();

        let envelope = envelope_from_request(&req);
        assert_eq!(envelope.headers, RawAuthHeaders::default());
    }
}
