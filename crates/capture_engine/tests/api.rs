use capture_engine::{
    capture_page_json, capture_progress_json, stop_capture_json, CaptureHandle, EngineConfig,
};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn handle(output_dir: &std::path::Path) -> CaptureHandle {
    CaptureHandle::new(EngineConfig {
        output_dir: output_dir.to_path_buf(),
        ..EngineConfig::default()
    })
    .expect("runtime starts")
}

fn parse(envelope: &str) -> Value {
    serde_json::from_str(envelope).expect("envelope is json")
}

#[test]
fn blocking_capture_returns_ok_envelope_with_result() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<h1>hello</h1>", "text/html"),
            )
            .mount(&server)
            .await;
        server
    });

    let dir = tempfile::tempdir().unwrap();
    let handle = handle(dir.path());
    let envelope = parse(&capture_page_json(&handle, &format!("{}/", server.uri()), "{}"));

    assert_eq!(envelope["code"], 200);
    assert_eq!(envelope["data"]["statusCode"], 200);
    assert_eq!(envelope["data"]["content"], "<h1>hello</h1>");
    assert!(envelope["data"]["archivePath"]
        .as_str()
        .is_some_and(|p| p.ends_with(".zip")));
    assert!(envelope.get("kind").is_none());

    let progress = parse(&capture_progress_json(&handle));
    assert_eq!(progress["code"], 200);
    assert_eq!(progress["data"]["phase"], "completed");
    assert_eq!(progress["data"]["totalFiles"], 0);
}

#[test]
fn invalid_input_maps_to_400() {
    let dir = tempfile::tempdir().unwrap();
    let handle = handle(dir.path());
    let envelope = parse(&capture_page_json(&handle, "", "{}"));
    assert_eq!(envelope["code"], 400);
    assert_eq!(envelope["kind"], "invalidInput");
    assert!(envelope.get("data").is_none());
}

#[test]
fn idle_progress_and_stop_are_ok() {
    let dir = tempfile::tempdir().unwrap();
    let handle = handle(dir.path());

    let progress = parse(&capture_progress_json(&handle));
    assert_eq!(progress["data"]["phase"], "idle");
    assert_eq!(progress["data"]["fileList"], Value::Array(Vec::new()));

    let stop = parse(&stop_capture_json(&handle));
    assert_eq!(stop["code"], 200);
    assert_eq!(stop["msg"], "no capture in progress");
}
