mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};

use bizhttp::{
    CallOptions, ClientConfig, ClientSettings, Hooks, HttpClient, NestBizData, ParamSource, Problem, create_client,
};
use common::{APP_ID, spawn_server};

struct Recorder {
    fails: Arc<Mutex<Vec<String>>>,
    invalid: Arc<AtomicUsize>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            fails: Arc::new(Mutex::new(Vec::new())),
            invalid: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn hooks(&self) -> Hooks {
        let fails = self.fails.clone();
        let invalid = self.invalid.clone();
        Hooks::new()
            .with_on_fail(move |msg, _| fails.lock().push(msg.to_string()))
            .with_on_invalid_token(move |_| {
                invalid.fetch_add(1, Ordering::SeqCst);
            })
    }

    fn fails(&self) -> Vec<String> {
        self.fails.lock().clone()
    }
}

fn client(base: &str, recorder: &Recorder, tweak: impl FnOnce(&mut ClientSettings)) -> HttpClient {
    let mut settings = ClientSettings::builder().base_address(base).build();
    tweak(&mut settings);
    create_client(ClientConfig::new(settings).with_hooks(recorder.hooks())).unwrap()
}

#[tokio::test]
async fn json_success_is_normalized() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let resp = client
        .post("/json/success", json!({ "id": "1" }), CallOptions::default())
        .await
        .unwrap();

    assert!(resp.ok);
    assert_eq!(resp.status, Some(200));
    assert!(resp.success);
    assert_eq!(resp.code.as_deref(), Some("SUCCESS"));
    assert_eq!(resp.msg.as_deref(), Some(""));
    assert_eq!(resp.body(), Some(&json!({ "foo": "bar" })));
    assert!(rec.fails().is_empty());
}

#[tokio::test]
async fn empty_object_payload_is_a_business_failure() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let resp = client.post("/number/200", Value::Null, CallOptions::default()).await.unwrap();
    assert!(resp.ok);
    assert!(!resp.success);
    assert_eq!(resp.code, None);
    assert_eq!(resp.data, Some(json!({})));
    assert_eq!(rec.fails(), ["处理失败，请重试"]);
}

#[tokio::test]
async fn missing_payload_reports_generic_failure() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let resp = client.get("/number/200", Value::Null, CallOptions::default()).await.unwrap();
    assert!(resp.ok);
    assert_eq!(resp.data, None);
    assert!(!resp.success);
    assert_eq!(rec.fails(), ["接口异常，请重试"]);
}

#[tokio::test]
async fn business_failures_use_server_message() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let resp = client.post("/json/fail", json!({}), CallOptions::default()).await.unwrap();
    assert_eq!(resp.code.as_deref(), Some("FAIL"));
    assert_eq!(resp.msg.as_deref(), Some("参数校验未通过"));

    client.post("/json/fail/ERR001", json!({}), CallOptions::default()).await.unwrap();
    assert_eq!(rec.fails(), ["参数校验未通过", "处理失败，请重试"]);
}

#[tokio::test]
async fn invalid_token_fires_dedicated_hook_only() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let resp = client
        .post("/json/fail/INVALID_TOKEN", json!({}), CallOptions::default())
        .await
        .unwrap();
    assert!(resp.invalid_token);
    assert!(!resp.success);
    assert_eq!(resp.msg.as_deref(), Some("登录信息已失效"));
    assert_eq!(rec.invalid.load(Ordering::SeqCst), 1);
    assert!(rec.fails().is_empty());
}

#[tokio::test]
async fn transport_problems_are_classified() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let resp = client.get("/number/404", Value::Null, CallOptions::default()).await.unwrap();
    assert!(!resp.ok);
    assert_eq!(resp.status, Some(404));
    assert_eq!(resp.problem, Some(Problem::ClientError));

    let resp = client.get("/number/500", Value::Null, CallOptions::default()).await.unwrap();
    assert_eq!(resp.problem, Some(Problem::ServerError));

    assert_eq!(rec.fails(), ["CLIENT_ERROR", "SERVER_ERROR"]);
}

#[tokio::test]
async fn unreachable_server_is_not_an_error() {
    let base = common::closed_address().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let resp = client.post("/json/success", json!({}), CallOptions::default()).await.unwrap();
    assert!(!resp.ok);
    assert_eq!(resp.status, None);
    assert_eq!(resp.problem, Some(Problem::ConnectionError));
    assert!(resp.original_error.is_some());
    assert_eq!(rec.fails(), ["CONNECTION_ERROR"]);
}

#[tokio::test]
async fn timeout_is_reported() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let options = CallOptions::builder().timeout(Duration::from_millis(50)).build();
    let resp = client.post("/slow", json!({}), options).await.unwrap();
    assert_eq!(resp.problem, Some(Problem::TimeoutError));
    assert_eq!(rec.fails(), ["TIMEOUT_ERROR"]);
}

#[tokio::test]
async fn per_call_overrides_do_not_leak() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let quiet = CallOptions::builder().no_fail(true).no_status_transform(true).build();
    let resp = client.post("/json/fail", json!({}), quiet).await.unwrap();
    assert!(rec.fails().is_empty());
    assert_eq!(resp.code, None);
    assert_eq!(client.response_transforms().len(), 3);

    let resp = client.post("/json/fail", json!({}), CallOptions::default()).await.unwrap();
    assert_eq!(resp.code.as_deref(), Some("FAIL"));
    assert_eq!(rec.fails(), ["参数校验未通过"]);
    assert!(!client.config().settings.no_fail);
}

#[tokio::test]
async fn per_call_fail_hook_replaces_instance_hook() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |_| {});

    let local = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = local.clone();
    let options = CallOptions::builder()
        .on_fail(Arc::new(move |msg: &str, _: &bizhttp::ApiResponse| sink.lock().push(msg.to_string())))
        .build();
    client.post("/json/fail", json!({}), options).await.unwrap();

    assert_eq!(*local.lock(), ["参数校验未通过"]);
    assert!(rec.fails().is_empty());
}

#[tokio::test]
async fn opted_out_transforms_cannot_be_reenabled() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let client = client(&base, &rec, |s| s.no_fail = true);

    let options = CallOptions::builder().no_fail(false).build();
    let resp = client.post("/json/fail", json!({}), options).await.unwrap();
    assert!(rec.fails().is_empty());
    assert_eq!(resp.code.as_deref(), Some("FAIL"));
}

#[tokio::test]
async fn per_call_base_address_wins() {
    let base = spawn_server().await;
    let closed = common::closed_address().await;
    let rec = Recorder::new();
    let client = client(&closed, &rec, |_| {});

    let options = CallOptions::builder().base_address(base.as_str()).build();
    let resp = client.post("/json/success", json!({}), options).await.unwrap();
    assert!(resp.success);
    assert_eq!(client.base_address(), closed);
}

#[tokio::test]
async fn common_params_nesting_modes() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let common = ParamSource::from_value(json!({ "appId": APP_ID, "id": "common" }));

    let build = |nest: NestBizData| {
        let settings = ClientSettings::builder()
            .base_address(base.as_str())
            .nest_biz_data(nest)
            .build();
        let hooks = rec.hooks().with_common_params(common.clone());
        create_client(ClientConfig::new(settings).with_hooks(hooks)).unwrap()
    };

    let resp = build(NestBizData::Default)
        .post("/echo", json!({ "id": "caller" }), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(
        resp.body().unwrap()["received"],
        json!({ "appId": APP_ID, "id": "common", "body": { "id": "caller" } })
    );

    let resp = build(NestBizData::Flat)
        .post("/echo", json!({ "id": "caller" }), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.body().unwrap()["received"], json!({ "appId": APP_ID, "id": "caller" }));

    let resp = build(NestBizData::CustomKey("payload".into()))
        .post("/echo", json!({ "id": "caller" }), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.body().unwrap()["received"]["payload"], json!({ "id": "caller" }));
}

#[tokio::test]
async fn query_methods_merge_common_params_into_query() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let settings = ClientSettings::builder().base_address(base.as_str()).build();
    let hooks = rec
        .hooks()
        .with_common_params(ParamSource::from_value(json!({ "appId": APP_ID, "page": "0" })));
    let client = create_client(ClientConfig::new(settings).with_hooks(hooks)).unwrap();

    let resp = client
        .get("/echo", json!({ "page": 2, "q": "a b" }), CallOptions::default())
        .await
        .unwrap();
    let query = &resp.body().unwrap()["query"];
    assert_eq!(query["appId"], APP_ID);
    assert_eq!(query["page"], "2");
    assert_eq!(query["q"], "a b");

    let err = client.get("/echo", json!([1, 2]), CallOptions::default()).await.unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn header_precedence() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let settings = ClientSettings::builder().base_address(base.as_str()).build();
    let hooks = rec
        .hooks()
        .with_common_headers(ParamSource::from_value(json!({ "x-common": "common", "x-both": "common" })));
    let client = create_client(ClientConfig::new(settings).with_hooks(hooks)).unwrap();

    client
        .set_headers([("x-instance", "instance"), ("x-both", "instance"), ("x-call", "instance")])
        .unwrap();

    let mut headers = HeaderMap::new();
    headers.insert("x-call", HeaderValue::from_static("call"));
    let options = CallOptions::builder().headers(headers).build();
    let resp = client.post("/echo", json!({}), options).await.unwrap();

    let seen = &resp.body().unwrap()["headers"];
    assert_eq!(seen["x-instance"], "instance");
    assert_eq!(seen["x-common"], "common");
    assert_eq!(seen["x-both"], "common");
    assert_eq!(seen["x-call"], "call");
}

#[tokio::test]
async fn repeated_calls_are_independent() {
    let base = spawn_server().await;
    let rec = Recorder::new();
    let common = ParamSource::from_value(json!({ "appId": APP_ID }));
    let settings = ClientSettings::builder().base_address(base.as_str()).build();
    let client = create_client(ClientConfig::new(settings).with_hooks(rec.hooks().with_common_params(common))).unwrap();

    let first = client.post("/echo", json!({ "id": "1" }), CallOptions::default()).await.unwrap();
    let second = client.post("/echo", json!({ "id": "1" }), CallOptions::default()).await.unwrap();
    assert_eq!(first.body().unwrap()["received"], second.body().unwrap()["received"]);
    assert_eq!(second.body().unwrap()["received"]["body"], json!({ "id": "1" }));
    assert_eq!(
        (first.ok, first.success, &first.code, &first.msg),
        (second.ok, second.success, &second.code, &second.msg)
    );
    assert!(second.success);
}
