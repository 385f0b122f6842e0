use serde_json::{Value, json};
use std::time::Duration;
use verisight_http::{HttpClient, HttpError, RequestOpts};
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn raw_body_is_sent_with_content_type_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/detector"))
        .and(header("content-type", "image/jpeg"))
        .and(header("authorization", "Bearer hf_test"))
        .and(body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"label": "fake", "score": 0.9}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/", server.uri())).unwrap();
    let got: Value = client
        .post_bytes_opts(
            "models/detector",
            &[0xFF, 0xD8, 0xFF],
            "image/jpeg",
            RequestOpts {
                bearer: Some("hf_test"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(got[0]["label"], "fake");
}

#[tokio::test]
async fn zero_retries_surfaces_first_503() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "loading"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/", server.uri()))
        .unwrap()
        .with_retries(0);
    let err = client
        .post_json_opts::<_, Value>("busy", &json!({}), RequestOpts::default())
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    match err {
        HttpError::Api { message, .. } => assert_eq!(message, "loading"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/", server.uri()))
        .unwrap()
        .with_retries(1);
    let got: Value = client.get_json("flaky", RequestOpts::default()).await.unwrap();
    assert_eq!(got["ok"], true);
}

#[tokio::test]
async fn timeout_maps_to_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/", server.uri()))
        .unwrap()
        .with_retries(0);
    let err = client
        .get_json::<Value>(
            "slow",
            RequestOpts {
                timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Network(_)), "got {err:?}");
}
