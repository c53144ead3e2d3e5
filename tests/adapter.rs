use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quill::extract::{BodyKind, ParamKind};
use quill::http::{header, Bytes, Method, StatusCode};
use quill::schema::Object;
use quill::{register, Context, Request, Response, RouteError, Schema, SharedState, UploadFile};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

#[derive(Debug, Deserialize, PartialEq, Schema, Serialize, Validate)]
struct PredictionRequest {
    #[validate(length(min = 1, max = 8))]
    features: Vec<f64>,
    #[schema(default = "default_model")]
    model_name: String,
    #[validate(range(min = 1, max = 100))]
    #[schema(default)]
    top_k: u32,
    note: Option<String>,
}

fn default_model() -> String {
    "default".to_owned()
}

fn request(method: Method, uri: &str, content_type: Option<&str>, body: &[u8]) -> Request {
    let mut req = http::Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        req = req.header(header::CONTENT_TYPE, content_type);
    }
    req.body(Bytes::copy_from_slice(body)).unwrap().into()
}

fn json_body(response: &Response) -> Value {
    serde_json::from_slice(response.body().as_bytes()).unwrap()
}

#[derive(Context)]
struct Predict {
    body: PredictionRequest,
}

#[tokio::test]
async fn schema_defaults_are_applied() {
    let registration = register(Method::POST, "/predict", |cx: Predict| async move {
        assert_eq!(cx.body.features, [1.0, 2.0]);
        assert_eq!(cx.body.model_name, "default");
        assert_eq!(cx.body.note, None);
        cx.body
    })
    .unwrap();

    assert_eq!(
        registration.body_param().map(|param| param.kind()),
        Some(ParamKind::Body(BodyKind::Schema))
    );

    let response = registration
        .dispatch(request(
            Method::POST,
            "/predict",
            Some("application/json"),
            br#"{"features": [1.0, 2.0], "top_k": 3}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(
        json_body(&response),
        json!({ "features": [1.0, 2.0], "model_name": "default", "top_k": 3, "note": null })
    );
}

#[tokio::test]
async fn type_errors_are_rejected_before_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let registration = register(Method::POST, "/predict", move |cx: Predict| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { cx.body }
    })
    .unwrap();

    let response = registration
        .dispatch(request(
            Method::POST,
            "/predict",
            None,
            br#"{"features": "not-a-list", "top_k": 3}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let body = json_body(&response);
    let detail = body["detail"].as_array().unwrap();
    assert_eq!(detail.len(), 1);
    assert_eq!(detail[0]["field"], "features");
    assert_eq!(detail[0]["code"], "invalid_type");
}

#[tokio::test]
async fn every_failing_field_is_reported() {
    let registration = register(Method::POST, "/predict", |cx: Predict| async move { cx.body }).unwrap();

    // missing and mistyped fields
    let response = registration
        .dispatch(request(Method::POST, "/predict", None, br#"{"top_k": "many"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(&response);
    let fields = body["detail"]
        .as_array()
        .unwrap()
        .iter()
        .map(|error| error["field"].as_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(fields, ["features", "top_k"]);
    assert_eq!(body["detail"][0]["code"], "missing");

    // constraint violations
    let response = registration
        .dispatch(request(
            Method::POST,
            "/predict",
            None,
            br#"{"features": [], "top_k": 0}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(&response);
    let fields = body["detail"]
        .as_array()
        .unwrap()
        .iter()
        .map(|error| error["field"].as_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(fields, ["features", "top_k"]);
    assert_eq!(body["detail"][0]["code"], "length");
    assert_eq!(body["detail"][1]["code"], "range");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let registration = register(Method::POST, "/predict", |cx: Predict| async move { cx.body }).unwrap();

    let response = registration
        .dispatch(request(Method::POST, "/predict", None, b"{\"features\": ["))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = registration
        .dispatch(request(Method::POST, "/predict", None, b"[1, 2]"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(&response)["detail"][0]["field"], "__root__");
}

#[tokio::test]
async fn schema_responses_round_trip() {
    let original = PredictionRequest {
        features: vec![0.5, -1.25],
        model_name: "resnet".to_owned(),
        top_k: 5,
        note: Some("hi".to_owned()),
    };
    let expected = serde_json::to_value(&original).unwrap();

    let registration = register(Method::POST, "/predict", |cx: Predict| async move { cx.body }).unwrap();
    let response = registration
        .dispatch(request(
            Method::POST,
            "/predict",
            None,
            &serde_json::to_vec(&expected).unwrap(),
        ))
        .await
        .unwrap();

    let parsed: PredictionRequest = serde_json::from_slice(response.body().as_bytes()).unwrap();
    assert_eq!(parsed, original);
}

#[derive(Context)]
struct Upload {
    files: UploadFile,
}

fn multipart(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in parts {
        body.extend_from_slice(b"--XyZ\r\n");
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.bin\"\r\n\r\n",
                name, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(b"--XyZ--\r\n");
    body
}

#[tokio::test]
async fn uploaded_files() {
    let registration = register(Method::POST, "/upload", |cx: Upload| async move {
        assert!(!cx.files.is_empty());
        assert_eq!(cx.files.keys(), ["image"]);
        assert_eq!(cx.files.get("image").map(|b| &b[..]), Some(&b"\x89PNG"[..]));
        for (name, data) in &cx.files {
            assert_eq!(cx.files.get(name), Some(data));
        }
        "ok"
    })
    .unwrap();

    let body = multipart(&[("image", b"\x89PNG")]);
    let response = registration
        .dispatch(request(
            Method::POST,
            "/upload",
            Some("multipart/form-data; boundary=XyZ"),
            &body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_bytes(), b"ok");
}

#[tokio::test]
async fn repeated_upload_fields_keep_the_last_value() {
    let registration = register(Method::POST, "/upload", |cx: Upload| async move {
        assert_eq!(cx.files.keys(), ["a", "b"]);
        assert_eq!(cx.files.get("a").map(|b| &b[..]), Some(&b"3"[..]));
    })
    .unwrap();

    let body = multipart(&[("a", b"1"), ("b", b"2"), ("a", b"3")]);
    let response = registration
        .dispatch(request(
            Method::POST,
            "/upload",
            Some("multipart/form-data; boundary=XyZ"),
            &body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_multipart_is_a_bad_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let registration = register(Method::POST, "/upload", move |_: Upload| {
        counter.fetch_add(1, Ordering::SeqCst);
        async {}
    })
    .unwrap();

    let response = registration
        .dispatch(request(Method::POST, "/upload", Some("text/plain"), b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[derive(Context)]
struct GetItem {
    id: String,
    #[cx(name = "page-size")]
    page_size: Option<String>,
}

#[tokio::test]
async fn path_params_are_strings() {
    let app = quill::App::new()
        .get("/items/:id", |cx: GetItem| async move {
            format!("{}:{}", cx.id, cx.page_size.as_deref().unwrap_or("-"))
        })
        .unwrap();

    let response = app.serve(request(Method::GET, "/items/42", None, b"")).await;
    assert_eq!(response.body().as_bytes(), b"42:-");

    let response = app
        .serve(request(Method::GET, "/items/007?page-size=10", None, b""))
        .await;
    assert_eq!(response.body().as_bytes(), b"007:10");
}

#[tokio::test]
async fn missing_params_are_a_bad_request() {
    let registration = register(Method::GET, "/items", |cx: GetItem| async move { cx.id }).unwrap();

    let response = registration
        .dispatch(request(Method::GET, "/items", None, b""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&response)["detail"].as_str().unwrap().contains("id"));
}

#[derive(Context)]
struct Raw {
    payload: Object,
    req: Request,
    global_dependencies: SharedState,
}

#[tokio::test]
async fn raw_dicts_and_injected_parameters() {
    let registration = register(Method::POST, "/raw", |cx: Raw| async move {
        assert_eq!(cx.req.path(), "/raw");
        assert_eq!(cx.req.body().as_ref(), br#"{"a": [1, "x"]}"#);
        assert!(cx.global_dependencies.is_empty());
        cx.payload
    })
    .unwrap();

    let kinds = registration
        .params()
        .iter()
        .map(|param| param.kind())
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        [
            ParamKind::Body(BodyKind::RawDict),
            ParamKind::Request,
            ParamKind::SharedState
        ]
    );

    let response = registration
        .dispatch(request(Method::POST, "/raw", None, br#"{"a": [1, "x"]}"#))
        .await
        .unwrap();
    assert_eq!(json_body(&response), json!({ "a": [1, "x"] }));

    let response = registration
        .dispatch(request(Method::POST, "/raw", None, b"not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[derive(Context)]
struct Conflicting {
    body: PredictionRequest,
    files: UploadFile,
}

#[test]
fn two_bodies_fail_registration() {
    let err = register(Method::POST, "/both", |_: Conflicting| async {}).unwrap_err();

    match &err {
        RouteError::MultipleBodies { params, .. } => assert_eq!(params, &["body", "files"]),
        other => panic!("unexpected error: {}", other),
    }

    let err = quill::App::new()
        .post("/both", |_: Conflicting| async {})
        .unwrap_err();
    assert!(matches!(err, RouteError::MultipleBodies { .. }));
}

#[tokio::test]
async fn registrations_are_independent() {
    async fn predict(cx: Predict) -> PredictionRequest {
        cx.body
    }

    let first = register(Method::POST, "/a", predict).unwrap();
    let second = register(Method::POST, "/a", predict).unwrap();
    assert_eq!(first.params(), second.params());

    let body = br#"{"features": [1.0], "top_k": 1}"#;
    let a = first
        .dispatch(request(Method::POST, "/a", None, body))
        .await
        .unwrap();
    let b = second
        .dispatch(request(Method::POST, "/a", None, body))
        .await
        .unwrap();
    assert_eq!(a.status(), b.status());
    assert_eq!(a.body(), b.body());
}

#[derive(Debug)]
struct Boom;

impl std::fmt::Display for Boom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("boom")
    }
}

impl std::error::Error for Boom {}

#[tokio::test]
async fn handler_errors_propagate() {
    let registration = register(Method::GET, "/fail", || async { Err::<String, _>(Boom) }).unwrap();

    let err = registration
        .dispatch(request(Method::GET, "/fail", None, b""))
        .await
        .unwrap_err();
    assert!(err.is::<Boom>());

    let app = quill::App::new()
        .get("/fail", || async { Err::<String, _>(Boom) })
        .unwrap();
    let response = app.serve(request(Method::GET, "/fail", None, b"")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn shared_state_is_visible_to_handlers() {
    #[derive(Context)]
    struct Models {
        global_dependencies: SharedState,
    }

    let mut state = SharedState::new();
    state.insert("model", String::from("resnet"));

    let app = quill::App::new()
        .get("/model", |cx: Models| async move {
            cx.global_dependencies
                .get::<String>("model")
                .cloned()
                .unwrap_or_default()
        })
        .unwrap()
        .state(state);

    let response = app.serve(request(Method::GET, "/model", None, b"")).await;
    assert_eq!(response.body().as_bytes(), b"resnet");
}

#[derive(Debug, Schema, Serialize, Validate)]
struct Labelled {
    features: Vec<f64>,
    #[validate(length(min = 1))]
    model_name: String,
    #[validate(range(min = 0.0, max = 1.0))]
    threshold: Option<f64>,
}

#[derive(Context)]
struct Label {
    body: Labelled,
}

#[tokio::test]
async fn type_and_constraint_errors_are_reported_together() {
    let registration = register(Method::POST, "/label", |cx: Label| async move { cx.body }).unwrap();

    let response = registration
        .dispatch(request(
            Method::POST,
            "/label",
            None,
            br#"{"features": "not-a-list", "model_name": "", "threshold": 3.0}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(&response);
    let detail = body["detail"].as_array().unwrap();
    let reported = detail
        .iter()
        .map(|error| (error["field"].as_str().unwrap(), error["code"].as_str().unwrap()))
        .collect::<Vec<_>>();
    assert_eq!(
        reported,
        [
            ("features", "invalid_type"),
            ("model_name", "length"),
            ("threshold", "range")
        ]
    );

    let response = registration
        .dispatch(request(
            Method::POST,
            "/label",
            None,
            br#"{"features": [0.5], "model_name": "resnet", "threshold": null}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response)["threshold"], Value::Null);
}

#[derive(Debug, Schema, Serialize, Validate)]
struct Annotated {
    features: Vec<f64>,
    metadata: Value,
}

#[derive(Context)]
struct Annotate {
    body: Annotated,
}

#[tokio::test]
async fn nullable_fields_are_still_required() {
    let registration = register(Method::POST, "/annotate", |cx: Annotate| async move { cx.body }).unwrap();

    let response = registration
        .dispatch(request(Method::POST, "/annotate", None, br#"{"features": [1.0]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(&response);
    assert_eq!(body["detail"][0]["field"], "metadata");
    assert_eq!(body["detail"][0]["code"], "missing");

    // an explicit null is a value
    let response = registration
        .dispatch(request(
            Method::POST,
            "/annotate",
            None,
            br#"{"features": [1.0], "metadata": null}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response), json!({ "features": [1.0], "metadata": null }));
}
