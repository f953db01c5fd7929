//! End-to-end tests of the upload, results and predictions flow.
//!
//! The models are replaced by stubs keyed on the image color: red images
//! contain a face, blue images contain a dog, anything else is unknown.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tower::ServiceExt;
use woof_api::{create_router, ApiConfig, AppState};
use woof_models::{Prediction, Verdict};
use woof_vision::{
    BreedPredictor, Classifier, DogDetector, FaceDetector, FaceRect, VisionResult,
};

const BOUNDARY: &str = "woof-test-boundary";
const RED: [u8; 3] = [220, 20, 20];
const BLUE: [u8; 3] = [20, 20, 220];
const GRAY: [u8; 3] = [128, 128, 128];

fn dominant(image: &DynamicImage) -> [u8; 3] {
    image.to_rgb8().get_pixel(0, 0).0
}

struct RedFace;

impl FaceDetector for RedFace {
    fn detect_faces(&self, image: &DynamicImage) -> VisionResult<Vec<FaceRect>> {
        if dominant(image) == RED {
            Ok(vec![FaceRect {
                x: 0,
                y: 0,
                width: image.width(),
                height: image.height(),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

struct BlueDog;

impl DogDetector for BlueDog {
    fn contains_dog(&self, image: &DynamicImage) -> VisionResult<bool> {
        Ok(dominant(image) == BLUE)
    }
}

struct AlwaysBeagle;

impl BreedPredictor for AlwaysBeagle {
    fn predict_breed(&self, _image: &DynamicImage) -> VisionResult<String> {
        Ok("Beagle".to_string())
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    _dir: tempfile::TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            upload_dir: dir.path().join("uploads"),
            ..ApiConfig::default()
        };
        let classifier = Classifier::new(
            Arc::new(RedFace),
            Arc::new(BlueDog),
            Arc::new(AlwaysBeagle),
        );
        let state = AppState::with_classifier(config, classifier).await.unwrap();
        Self {
            router: create_router(state.clone(), None),
            state,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// POST one multipart request, returning the session cookie to reuse.
    async fn upload(
        &self,
        files: &[(&str, &str, Vec<u8>)],
        cookie: Option<&str>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let response = self
            .send(builder.body(Body::from(multipart_body(files))).unwrap())
            .await;
        (response.status(), session_cookie(&response))
    }
}

fn png(color: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(color)));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn multipart_body(files: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, (name, content_type, bytes)) in files.iter().enumerate() {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file[{}]\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, i, name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn session_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn api_predictions(app: &TestApp, cookie: &str) -> Vec<Prediction> {
    let response = app.get("/api/predictions", Some(cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    serde_json::from_value(json["predictions"].clone()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ready_reports_storage() {
    let app = TestApp::new().await;
    let response = app.get("/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ready");
    assert_eq!(json["checks"]["storage"]["status"], "ok");
    assert!(json["checks"].get("models").is_none());

    std::fs::remove_dir_all(app.state.uploads.root()).unwrap();
    let response = app.get("/ready", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["checks"]["storage"]["status"], "error");
}

#[tokio::test]
async fn test_index_serves_upload_form_and_cookie() {
    let app = TestApp::new().await;
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).starts_with("woof_session="));
    assert!(body_text(response).await.contains("multipart/form-data"));
}

#[tokio::test]
async fn test_predictions_follow_upload_order() {
    let app = TestApp::new().await;

    let (status, cookie) = app.upload(&[("person.png", "image/png", png(RED))], None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, cookie) = app
        .upload(&[("puppy.png", "image/png", png(BLUE))], Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, cookie) = app
        .upload(&[("wall.png", "image/png", png(GRAY))], Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK);

    let results = app.get("/results", Some(&cookie)).await;
    assert_eq!(results.status(), StatusCode::OK);
    let html = body_text(results).await;
    assert!(html.find("person.png").unwrap() < html.find("puppy.png").unwrap());

    let predictions = api_predictions(&app, &cookie).await;
    let verdicts: Vec<_> = predictions.iter().map(|p| p.verdict.clone()).collect();
    assert_eq!(
        verdicts,
        vec![
            Verdict::Human {
                breed: "Beagle".to_string()
            },
            Verdict::Dog {
                breed: "Beagle".to_string()
            },
            Verdict::Unknown,
        ]
    );
    assert!(predictions[0].url.ends_with("person.png"));
    assert!(predictions[1].message.starts_with("Looks like a dog!"));
}

#[tokio::test]
async fn test_multiple_files_in_one_request() {
    let app = TestApp::new().await;
    let (status, cookie) = app
        .upload(
            &[
                ("a.png", "image/png", png(BLUE)),
                ("b.png", "image/png", png(RED)),
            ],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let response = app.get("/predictions", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Looks like a dog! Perhaps a Beagle"));
    assert!(html.contains("Looks like a human!"));
}

#[tokio::test]
async fn test_results_without_uploads_redirects_home() {
    let app = TestApp::new().await;

    let response = app.get("/results", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let response = app.get("/predictions", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_index_clears_previous_uploads() {
    let app = TestApp::new().await;
    let (_, cookie) = app.upload(&[("dog.png", "image/png", png(BLUE))], None).await;

    let response = app.get("/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/results", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(api_predictions(&app, &cookie).await.is_empty());
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = TestApp::new().await;
    let (_, alice) = app.upload(&[("alice.png", "image/png", png(RED))], None).await;
    let (_, bob) = app.upload(&[("bob.png", "image/png", png(BLUE))], None).await;
    assert_ne!(alice, bob);

    let alice_predictions = api_predictions(&app, &alice).await;
    assert_eq!(alice_predictions.len(), 1);
    let alice_url = alice_predictions[0].url.clone();

    let response = app.get(&alice_url, Some(&alice)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get(&alice_url, Some(&bob)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let bob_predictions = api_predictions(&app, &bob).await;
    assert_eq!(bob_predictions.len(), 1);
    assert!(bob_predictions[0].url.ends_with("bob.png"));
}

#[tokio::test]
async fn test_rejects_non_image_upload() {
    let app = TestApp::new().await;
    let (status, cookie) = app
        .upload(&[("notes.txt", "text/plain", b"hello".to_vec())], None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app.get("/results", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app.upload(&[], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_undecodable_image_fails_alone() {
    let app = TestApp::new().await;
    let (_, cookie) = app
        .upload(
            &[
                ("broken.png", "image/png", b"not really a png".to_vec()),
                ("dog.png", "image/png", png(BLUE)),
            ],
            None,
        )
        .await;

    let predictions = api_predictions(&app, &cookie).await;
    assert_eq!(predictions.len(), 2);
    assert!(matches!(predictions[0].verdict, Verdict::Failed { .. }));
    assert_eq!(predictions[1].verdict.as_str(), "dog");
}

#[tokio::test]
async fn test_forged_cookie_starts_fresh_session() {
    let app = TestApp::new().await;
    let (_, cookie) = app.upload(&[("dog.png", "image/png", png(BLUE))], None).await;
    let forged = format!("{}x", cookie);

    let response = app.get("/results", Some(&forged)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_ne!(session_cookie(&response), cookie);
}

#[tokio::test]
async fn test_cookieless_reads_keep_no_session_state() {
    let app = TestApp::new().await;
    for _ in 0..5 {
        let response = app.get("/results", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let response = app.get("/predictions", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let response = app
            .get("/uploads/0b6f3c1e-6a8a-4e52-9f0e-3f1f6a9d2c11/000001-a.png", None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
    assert!(app.state.sessions.is_empty().await);

    let (status, _) = app.upload(&[("dog.png", "image/png", png(BLUE))], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.sessions.len().await, 1);
}

#[tokio::test]
async fn test_rejected_field_discards_whole_upload() {
    let app = TestApp::new().await;
    let (status, cookie) = app
        .upload(
            &[
                ("dog.png", "image/png", png(BLUE)),
                ("notes.txt", "text/plain", b"hello".to_vec()),
            ],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, cookie) = app
        .upload(
            &[
                ("person.png", "image/png", png(RED)),
                ("empty.png", "image/png", Vec::new()),
            ],
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app.get("/results", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(api_predictions(&app, &cookie).await.is_empty());
    assert!(app.state.uploads.batches().await.unwrap().is_empty());
    assert!(app.state.sessions.is_empty().await);
}
