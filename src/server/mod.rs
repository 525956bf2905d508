//! HTTP surface.
//!
//! Every tool endpoint runs the same pipeline: resolve the caller, reserve a
//! use from the daily quota, read the multipart form under the caller's size
//! limit, then convert on the blocking pool. A conversion that fails releases
//! its reservation, so only successful ones are counted.

mod account;
mod caller;
mod form;
mod response;
mod tools;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AuthProvider, HeaderAuth};
use crate::billing::{BillingWebhook, StripeCustomers};
use crate::config::ServerConfig;
use crate::entitlement::{EntitlementStore, MemoryEntitlements};
use crate::sqlite::SqliteStore;
use crate::usage::{MemoryUsageStore, UsageLimiter, UsageStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub limiter: UsageLimiter,
    pub auth: Arc<dyn AuthProvider>,
    pub billing: Arc<BillingWebhook>,
}

/// Wire stores, auth and billing from configuration. With a database path
/// one SQLite file backs both usage counts and entitlements.
pub fn build_state(config: ServerConfig) -> Result<AppState> {
    let (usage, entitlements): (Arc<dyn UsageStore>, Arc<dyn EntitlementStore>) =
        match &config.database {
            Some(path) => {
                let store = Arc::new(
                    SqliteStore::open(path)
                        .with_context(|| format!("Failed to open database {}", path.display()))?,
                );
                info!(path = %path.display(), "Using SQLite store");
                (store.clone(), store)
            }
            None => {
                warn!("No database configured, usage and subscriptions are kept in memory");
                (
                    Arc::new(MemoryUsageStore::new()),
                    Arc::new(MemoryEntitlements::new()),
                )
            }
        };

    let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
        .with_context(|| format!("Invalid identity header: {}", config.identity_header))?;

    if config.stripe_webhook_secret.is_empty() {
        warn!("STRIPE_WEBHOOK_SECRET is not set, every webhook will be rejected");
    }
    let billing = BillingWebhook::new(
        config.stripe_webhook_secret.clone(),
        config.webhook_tolerance_secs,
        Arc::new(StripeCustomers::new(config.stripe_secret_key.clone())),
        entitlements.clone(),
    );

    Ok(AppState {
        limiter: UsageLimiter::new(usage, config.daily_limit),
        auth: Arc::new(HeaderAuth::new(identity_header, entitlements)),
        billing: Arc::new(billing),
        config: Arc::new(config),
    })
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_request_bytes;

    Router::new()
        .route("/api/tools/pdf/merge", post(tools::pdf_merge))
        .route("/api/tools/pdf/split", post(tools::pdf_split))
        .route("/api/tools/pdf/compress", post(tools::pdf_compress))
        .route("/api/tools/image/compress", post(tools::image_compress))
        .route("/api/tools/image/convert", post(tools::image_convert))
        .route("/api/tools/image/resize", post(tools::image_resize))
        .route("/api/tools/image/to-pdf", post(tools::images_to_pdf))
        .route("/api/usage", get(account::usage))
        .route("/api/plans", get(account::plans))
        .route("/api/webhook", post(account::webhook))
        .route("/health", get(account::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let bind = config.bind;
    let app = router(build_state(config)?);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(addr = %bind, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(e) => warn!(error = %e, "Failed to listen for ctrl-c"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::signature::sign;
    use crate::billing::StaticCustomers;
    use crate::pdf::test_support::sample_pdf;
    use crate::pdf::PdfDocument;
    use crate::raster::test_support::sample_png;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "pagesmith-test-boundary";
    const SECRET: &str = "whsec_test";

    struct Harness {
        app: Router,
        entitlements: Arc<MemoryEntitlements>,
    }

    fn harness(config: ServerConfig) -> Harness {
        let entitlements = Arc::new(MemoryEntitlements::new());
        let billing = BillingWebhook::new(
            SECRET,
            i64::MAX,
            Arc::new(StaticCustomers::new([("cus_1", "paid@example.com")])),
            entitlements.clone(),
        );
        let state = AppState {
            limiter: UsageLimiter::new(Arc::new(MemoryUsageStore::new()), config.daily_limit),
            auth: Arc::new(HeaderAuth::new(
                HeaderName::from_static("x-auth-request-email"),
                entitlements.clone(),
            )),
            billing: Arc::new(billing),
            config: Arc::new(config),
        };
        Harness {
            app: router(state),
            entitlements,
        }
    }

    enum Part<'a> {
        File(&'a str, &'a str, Vec<u8>),
        Text(&'a str, &'a str),
    }

    fn multipart(parts: Vec<Part<'_>>) -> Body {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Body::from(body)
    }

    fn upload(uri: &str, email: Option<&str>, parts: Vec<Part<'_>>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header("x-forwarded-for", "203.0.113.9");
        if let Some(email) = email {
            builder = builder.header("x-auth-request-email", email);
        }
        builder.body(multipart(parts)).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    fn split_request(pages: &str) -> Request<Body> {
        upload(
            "/api/tools/pdf/split",
            None,
            vec![
                Part::File("file", "doc.pdf", sample_pdf(5)),
                Part::Text("pages", pages),
            ],
        )
    }

    #[tokio::test]
    async fn test_split_returns_selected_pages() {
        let h = harness(ServerConfig::default());
        let response = send(&h.app, split_request("1-2, 5")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"split.pdf\""
        );
        assert_eq!(response.headers()["x-usage-remaining"], "4");

        let pdf = PdfDocument::load(&body_bytes(response).await).unwrap();
        assert_eq!(pdf.page_count(), 3);
    }

    #[tokio::test]
    async fn test_split_with_no_valid_pages_is_rejected() {
        let h = harness(ServerConfig::default());
        let response = send(&h.app, split_request("9-12, abc")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "No valid pages specified" })
        );
    }

    #[tokio::test]
    async fn test_failed_conversions_are_not_counted() {
        let h = harness(ServerConfig {
            daily_limit: 1,
            ..ServerConfig::default()
        });
        let rejected = send(&h.app, split_request("40")).await;
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        let corrupt = send(
            &h.app,
            upload(
                "/api/tools/pdf/split",
                None,
                vec![
                    Part::File("file", "doc.pdf", b"not a pdf".to_vec()),
                    Part::Text("pages", "1"),
                ],
            ),
        )
        .await;
        assert_eq!(corrupt.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let accepted = send(&h.app, split_request("1")).await;
        assert_eq!(accepted.status(), StatusCode::OK);
        assert_eq!(accepted.headers()["x-usage-remaining"], "0");
    }

    #[tokio::test]
    async fn test_quota_exhaustion() {
        let h = harness(ServerConfig {
            daily_limit: 2,
            ..ServerConfig::default()
        });
        for _ in 0..2 {
            let response = send(&h.app, split_request("1")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&h.app, split_request("1")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await,
            json!({
                "error": "Daily limit reached. Upgrade to Pro for unlimited access.",
                "remaining": 0
            })
        );
    }

    #[tokio::test]
    async fn test_entitled_callers_are_unlimited() {
        let h = harness(ServerConfig {
            daily_limit: 1,
            ..ServerConfig::default()
        });
        h.entitlements.set_entitled("pro@example.com", true).unwrap();

        for _ in 0..3 {
            let request = upload(
                "/api/tools/pdf/split",
                Some("pro@example.com"),
                vec![
                    Part::File("file", "doc.pdf", sample_pdf(2)),
                    Part::Text("pages", "2"),
                ],
            );
            let response = send(&h.app, request).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get("x-usage-remaining").is_none());
        }
    }

    #[tokio::test]
    async fn test_merge_requires_two_files() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/pdf/merge",
            None,
            vec![Part::File("files", "a.pdf", sample_pdf(1))],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "At least 2 PDF files are required" })
        );
    }

    #[tokio::test]
    async fn test_merge_concatenates_pages() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/pdf/merge",
            None,
            vec![
                Part::File("files", "a.pdf", sample_pdf(2)),
                Part::File("files", "b.pdf", sample_pdf(3)),
            ],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let pdf = PdfDocument::load(&body_bytes(response).await).unwrap();
        assert_eq!(pdf.page_count(), 5);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/pdf/compress",
            None,
            vec![Part::Text("quality", "50")],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "No file provided" }));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_unprocessable() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/pdf/compress",
            None,
            vec![Part::File("file", "doc.pdf", b"not a pdf".to_vec())],
        );
        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_compress_reports_sizes() {
        let h = harness(ServerConfig::default());
        let original = sample_pdf(3);
        let original_len = original.len().to_string();
        let request = upload(
            "/api/tools/pdf/compress",
            None,
            vec![Part::File("file", "doc.pdf", original)],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-original-size"], original_len.as_str());
        let reported: usize = response.headers()["x-compressed-size"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(body_bytes(response).await.len(), reported);
    }

    #[tokio::test]
    async fn test_upload_over_free_limit() {
        let h = harness(ServerConfig {
            free_upload_mb: 0,
            ..ServerConfig::default()
        });
        let response = send(&h.app, split_request("1")).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_resize_validates_dimensions() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/image/resize",
            None,
            vec![
                Part::File("file", "a.png", sample_png(4, 4)),
                Part::Text("width", "0"),
                Part::Text("height", "10"),
            ],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Invalid dimensions" }));
    }

    #[tokio::test]
    async fn test_resize() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/image/resize",
            None,
            vec![
                Part::File("file", "a.png", sample_png(8, 8)),
                Part::Text("width", "3"),
                Part::Text("height", "5"),
            ],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let img = image::load_from_memory(&body_bytes(response).await).unwrap();
        assert_eq!((img.width(), img.height()), (3, 5));
    }

    #[tokio::test]
    async fn test_resize_reads_leading_digits() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/image/resize",
            None,
            vec![
                Part::File("file", "a.png", sample_png(8, 8)),
                Part::Text("width", "12.5"),
                Part::Text("height", "7px"),
            ],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let img = image::load_from_memory(&body_bytes(response).await).unwrap();
        assert_eq!((img.width(), img.height()), (12, 7));
    }

    #[tokio::test]
    async fn test_resize_rejects_negative_and_oversized() {
        let h = harness(ServerConfig::default());
        for (width, height) in [("-5", "10"), ("99999999999", "10")] {
            let request = upload(
                "/api/tools/image/resize",
                None,
                vec![
                    Part::File("file", "a.png", sample_png(4, 4)),
                    Part::Text("width", width),
                    Part::Text("height", height),
                ],
            );
            let response = send(&h.app, request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_convert_rejects_unknown_format() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/image/convert",
            None,
            vec![
                Part::File("file", "a.png", sample_png(4, 4)),
                Part::Text("format", "tiff"),
            ],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Invalid format. Supported: PNG, JPG, WebP, GIF" })
        );
    }

    #[tokio::test]
    async fn test_convert_keeps_requested_extension() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/image/convert",
            None,
            vec![
                Part::File("file", "a.png", sample_png(4, 4)),
                Part::Text("format", "JPEG"),
            ],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"converted.jpeg\""
        );
    }

    #[tokio::test]
    async fn test_image_compress_returns_data_urls() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/image/compress",
            None,
            vec![
                Part::File("files", "a.png", sample_png(16, 16)),
                Part::File("files", "b.png", sample_png(8, 8)),
            ],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["name"], "a.png");
        assert!(results[0]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert!(results[1]["compressedSize"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_images_to_pdf() {
        let h = harness(ServerConfig::default());
        let request = upload(
            "/api/tools/image/to-pdf",
            None,
            vec![
                Part::File("files", "a.png", sample_png(20, 10)),
                Part::File("files", "b.png", sample_png(10, 20)),
            ],
        );
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let pdf = PdfDocument::load(&body_bytes(response).await).unwrap();
        assert_eq!(pdf.page_count(), 2);
    }

    #[tokio::test]
    async fn test_usage_reports_counts() {
        let h = harness(ServerConfig {
            daily_limit: 3,
            ..ServerConfig::default()
        });
        send(&h.app, split_request("1")).await;

        let request = Request::builder()
            .uri("/api/usage")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let body = body_json(send(&h.app, request).await).await;

        assert_eq!(body["used"], 1);
        assert_eq!(body["limit"], 3);
        assert_eq!(body["remaining"], 2);
        assert_eq!(body["entitled"], false);
        assert!(body["resetsAt"].is_string());
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let h = harness(ServerConfig::default());
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhook")
            .header("stripe-signature", "t=1,v1=00")
            .body(Body::from("{}"))
            .unwrap();
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Invalid signature" }));
    }

    #[tokio::test]
    async fn test_webhook_grants_entitlement() {
        let h = harness(ServerConfig::default());
        let payload = json!({
            "type": "checkout.session.completed",
            "data": { "object": { "customer_email": "new@example.com" } }
        })
        .to_string();
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhook")
            .header("stripe-signature", sign(payload.as_bytes(), SECRET, 1_700_000_000))
            .body(Body::from(payload))
            .unwrap();
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "received": true }));
        assert!(h.entitlements.is_entitled("new@example.com").unwrap());
    }

    #[tokio::test]
    async fn test_plans_and_health() {
        let h = harness(ServerConfig {
            stripe_price_monthly: Some("price_m".into()),
            ..ServerConfig::default()
        });

        let request = Request::builder().uri("/api/plans").body(Body::empty()).unwrap();
        let plans = body_json(send(&h.app, request).await).await;
        assert_eq!(plans[0]["id"], "free");
        assert_eq!(plans[1]["priceId"], "price_m");
        assert!(plans[2].get("priceId").is_none());

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
    }
}
