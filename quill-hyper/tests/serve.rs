use hyper::service::Service;
use quill::http::StatusCode;
use quill::{App, Request};
use quill_hyper::{Serve, ServeConfig};

fn app() -> App {
    App::new()
        .post("/echo", |req: Request| async move { req.body().clone() })
        .unwrap()
}

#[tokio::test]
async fn buffers_request_body() {
    let mut service = app().into_service(ServeConfig::new());

    let req = hyper::Request::post("/echo")
        .body(hyper::Body::from("hello"))
        .unwrap();
    let res = service.call(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn rejects_large_bodies() {
    let mut service = app().into_service(ServeConfig::new().max_body_size(4));

    let req = hyper::Request::post("/echo")
        .body(hyper::Body::from("too large"))
        .unwrap();
    let res = service.call(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn unknown_routes() {
    let mut service = app().into_service(ServeConfig::default());

    let req = hyper::Request::get("/missing")
        .body(hyper::Body::empty())
        .unwrap();
    let res = service.call(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let req = hyper::Request::get("/echo").body(hyper::Body::empty()).unwrap();
    let res = service.call(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["allow"], "POST");
}
