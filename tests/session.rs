//! End-to-end session tests against a scripted in-process endpoint.
//!
//! Each test spawns a real WebSocket server that plays the browser's
//! side of the conversation: it reads commands, sends responses and
//! interleaves events, exactly as a debugging endpoint would.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use chrome_devtools_driver::{Error, PageStatus, ScriptValue, Session};

type Endpoint = tokio_tungstenite::WebSocketStream<TcpStream>;

const BASE_URL: &str = "http://localhost:8000";

// ============================================================================
// Scripted endpoint helpers
// ============================================================================

/// Initialize tracing for tests; honors `RUST_LOG`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

/// Binds a listener and runs `script` as the browser side of one
/// connection. Returns the `ws://` URL to connect to.
async fn spawn_endpoint<F, Fut>(script: F) -> (String, JoinHandle<()>)
where
    F: FnOnce(Endpoint) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let endpoint = accept_async(stream).await.expect("handshake");
        script(endpoint).await;
    });
    (format!("ws://{addr}"), handle)
}

/// Reads the next command frame, answering pings along the way.
async fn next_command(endpoint: &mut Endpoint) -> Value {
    loop {
        match endpoint.next().await.expect("frame").expect("read") {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("json"),
            Message::Ping(payload) => {
                endpoint.send(Message::Pong(payload)).await.expect("pong");
            }
            Message::Close(_) => panic!("client closed early"),
            _ => {}
        }
    }
}

async fn send_json(endpoint: &mut Endpoint, value: Value) {
    endpoint
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Answers the command in `command` with `result`.
async fn reply(endpoint: &mut Endpoint, command: &Value, result: Value) {
    let id = command.get("id").cloned().expect("command id");
    send_json(endpoint, json!({"id": id, "result": result})).await;
}

async fn send_event(endpoint: &mut Endpoint, method: &str, params: Value) {
    send_json(endpoint, json!({"method": method, "params": params})).await;
}

fn method(command: &Value) -> &str {
    command.get("method").and_then(Value::as_str).expect("method")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_start_handshake_returns_target() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        loop {
            let command = next_command(&mut endpoint).await;
            if method(&command) == "Target.getTargetInfo" {
                reply(
                    &mut endpoint,
                    &command,
                    json!({"targetInfo": {"targetId": "T1", "type": "page"}}),
                )
                .await;
                break;
            }
            reply(&mut endpoint, &command, json!({})).await;
        }
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    let target = session.start().await.expect("start");
    assert_eq!(target.as_str(), "T1");
    assert_eq!(session.target_id().map(|t| t.as_str()), Some("T1"));
    assert_eq!(session.page_status(), PageStatus::Ready);

    server.await.expect("server");
}

#[tokio::test]
async fn test_visit_load_cycle_captures_response() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        // Page.stopLoading fired by visit().
        let stop = next_command(&mut endpoint).await;
        assert_eq!(method(&stop), "Page.stopLoading");
        reply(&mut endpoint, &stop, json!({})).await;

        let navigate = next_command(&mut endpoint).await;
        assert_eq!(method(&navigate), "Page.navigate");
        assert_eq!(
            navigate.get("params").and_then(|p| p.get("url")),
            Some(&json!("http://localhost:8000/form"))
        );
        reply(&mut endpoint, &navigate, json!({"frameId": "F1"})).await;

        send_event(&mut endpoint, "Page.frameStartedLoading", json!({"frameId": "F1"})).await;
        send_event(
            &mut endpoint,
            "Network.requestWillBeSent",
            json!({"type": "Document", "requestId": "R1"}),
        )
        .await;
        send_event(
            &mut endpoint,
            "Network.responseReceived",
            json!({
                "type": "Document",
                "requestId": "R1",
                "response": {
                    "status": 200,
                    "url": "http://localhost:8000/form",
                    "headers": {"Content-Type": "text/html"},
                }
            }),
        )
        .await;
        send_event(&mut endpoint, "Page.frameStoppedLoading", json!({"frameId": "F1"})).await;
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    session
        .visit("http://localhost:8000/form")
        .await
        .expect("visit");
    assert_eq!(session.page_status(), PageStatus::Loading);

    session.wait_for_load().await.expect("load");
    assert_eq!(session.page_status(), PageStatus::Ready);

    let response = session.get_response().await.expect("response");
    assert_eq!(response.status, 200);
    assert_eq!(response.url, "http://localhost:8000/form");
    assert_eq!(
        response.headers.get("Content-Type").map(String::as_str),
        Some("text/html")
    );

    server.await.expect("server");
}

#[tokio::test]
async fn test_evaluate_retries_bare_return_as_iife() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        let first = next_command(&mut endpoint).await;
        assert_eq!(method(&first), "Runtime.evaluate");
        assert_eq!(
            first["params"]["expression"],
            json!("return 5;")
        );
        reply(
            &mut endpoint,
            &first,
            json!({"result": {
                "type": "object",
                "subtype": "error",
                "className": "SyntaxError",
                "description": "SyntaxError: Illegal return statement",
            }}),
        )
        .await;

        let retry = next_command(&mut endpoint).await;
        assert_eq!(method(&retry), "Runtime.evaluate");
        assert_eq!(
            retry["params"]["expression"],
            json!("(function() {return 5;}());")
        );
        reply(
            &mut endpoint,
            &retry,
            json!({"result": {"type": "number", "value": 5}}),
        )
        .await;
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    let value = session.evaluate("return 5;").await.expect("evaluate");
    assert_eq!(value, ScriptValue::Number(5.0));

    server.await.expect("server");
}

#[tokio::test]
async fn test_evaluate_array_fetches_properties() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        let evaluate = next_command(&mut endpoint).await;
        reply(
            &mut endpoint,
            &evaluate,
            json!({"result": {
                "type": "object",
                "subtype": "array",
                "className": "Array",
                "objectId": "obj-1",
            }}),
        )
        .await;

        let fetch = next_command(&mut endpoint).await;
        assert_eq!(method(&fetch), "Runtime.getProperties");
        assert_eq!(fetch["params"]["objectId"], json!("obj-1"));
        reply(
            &mut endpoint,
            &fetch,
            json!({"result": [
                {"name": "0", "value": {"type": "string", "value": "a"}},
                {"name": "1", "value": {"type": "number", "value": 2}},
                {"name": "length", "value": {"type": "number", "value": 2}},
                {"name": "__proto__", "value": {"type": "object"}},
            ]}),
        )
        .await;
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    let value = session.evaluate("['a', 2]").await.expect("evaluate");
    assert_eq!(
        value,
        ScriptValue::Array(vec![
            ScriptValue::String("a".into()),
            ScriptValue::Number(2.0),
        ])
    );

    server.await.expect("server");
}

#[tokio::test]
async fn test_get_response_synthesizes_for_unobserved_navigation() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        let reload = next_command(&mut endpoint).await;
        assert_eq!(method(&reload), "Page.reload");
        reply(&mut endpoint, &reload, json!({})).await;

        // The load completed so fast the network instrumentation saw
        // nothing; only the DOM probe confirms it.
        let probe = next_command(&mut endpoint).await;
        assert_eq!(method(&probe), "Runtime.evaluate");
        let expression = probe["params"]["expression"].as_str().expect("expression");
        assert!(expression.contains("document.readyState"));
        reply(
            &mut endpoint,
            &probe,
            json!({"result": {"type": "boolean", "value": true}}),
        )
        .await;
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    session.reload().await.expect("reload");
    assert_eq!(session.page_status(), PageStatus::Loading);

    let response = session.get_response().await.expect("response");
    assert_eq!(response.status, 200);
    assert!(response.headers.is_empty());
    assert_eq!(response.url, "");

    server.await.expect("server");
}

#[tokio::test]
async fn test_wait_returns_on_truthy_predicate() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        let first = next_command(&mut endpoint).await;
        assert_eq!(method(&first), "Runtime.evaluate");
        reply(
            &mut endpoint,
            &first,
            json!({"result": {"type": "boolean", "value": false}}),
        )
        .await;

        let second = next_command(&mut endpoint).await;
        reply(
            &mut endpoint,
            &second,
            json!({"result": {"type": "boolean", "value": true}}),
        )
        .await;
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    let hit = session
        .wait(5_000, "document.title != ''")
        .await
        .expect("wait");
    assert!(hit);

    server.await.expect("server");
}

#[tokio::test]
async fn test_wait_deadline_returns_last_falsy() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        // Answer false to every probe until the client goes away.
        while let Some(Ok(message)) = endpoint.next().await {
            let Message::Text(text) = message else { break };
            let command: Value = serde_json::from_str(text.as_str()).expect("json");
            reply(
                &mut endpoint,
                &command,
                json!({"result": {"type": "boolean", "value": false}}),
            )
            .await;
        }
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    let hit = session.wait(50, "window.done").await.expect("wait");
    assert!(!hit);

    drop(session);
    server.await.expect("server");
}

#[tokio::test]
async fn test_await_survives_interleaved_frames() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        let command = next_command(&mut endpoint).await;
        let id = command["id"].clone();

        // An event and a stale response land before the real answer.
        send_event(&mut endpoint, "DOM.documentUpdated", json!({})).await;
        send_json(&mut endpoint, json!({"id": 9999, "result": {}})).await;
        send_json(
            &mut endpoint,
            json!({"id": id, "result": {"product": "HeadlessChrome"}}),
        )
        .await;
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    let result = session
        .send("Browser.getVersion", json!({}))
        .await
        .expect("send");
    assert_eq!(result["product"], json!("HeadlessChrome"));

    server.await.expect("server");
}

#[tokio::test]
async fn test_protocol_error_reply_surfaces() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        let command = next_command(&mut endpoint).await;
        let id = command["id"].clone();
        send_json(
            &mut endpoint,
            json!({"id": id, "error": {"code": -32601, "message": "method not found"}}),
        )
        .await;
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    let err = session
        .send("Bogus.method", json!({}))
        .await
        .expect_err("rejected");
    assert!(matches!(err, Error::Protocol { code: -32601, .. }));
    assert!(err.is_method_not_found());

    server.await.expect("server");
}

#[tokio::test]
async fn test_connection_lost_mid_await() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        let _command = next_command(&mut endpoint).await;
        endpoint.close(None).await.expect("close");
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");
    let err = session
        .send("Browser.getVersion", json!({}))
        .await
        .expect_err("lost");
    assert!(matches!(err, Error::ConnectionLost));
    assert!(err.is_connection_error());

    server.await.expect("server");
}

#[tokio::test]
async fn test_dialog_blocks_until_closed() {
    let (url, server) = spawn_endpoint(|mut endpoint| async move {
        let first = next_command(&mut endpoint).await;
        send_event(&mut endpoint, "Page.javascriptDialogOpening", json!({})).await;
        reply(&mut endpoint, &first, json!({})).await;

        // dismiss_alert fires the handle command without awaiting it.
        let dismiss = next_command(&mut endpoint).await;
        assert_eq!(method(&dismiss), "Page.handleJavaScriptDialog");
        assert_eq!(dismiss["params"]["accept"], json!(false));
        reply(&mut endpoint, &dismiss, json!({})).await;
        send_event(&mut endpoint, "Page.javascriptDialogClosed", json!({})).await;

        let probe = next_command(&mut endpoint).await;
        reply(&mut endpoint, &probe, json!({})).await;
    })
    .await;

    let mut session = Session::connect(&url, BASE_URL).await.expect("connect");

    // The dialog event arrives during this roundtrip's pumping.
    session.send("Browser.getVersion", json!({})).await.expect("send");
    assert!(session.has_javascript_dialog());
    assert_eq!(session.page_status(), PageStatus::DialogBlocked);

    session.dismiss_alert().await.expect("dismiss");
    // Another roundtrip pumps the closed event through.
    session.send("Browser.getVersion", json!({})).await.expect("probe");
    assert!(!session.has_javascript_dialog());
    assert_eq!(session.page_status(), PageStatus::Ready);

    server.await.expect("server");
}
