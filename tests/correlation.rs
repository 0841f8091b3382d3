// tests/correlation.rs

use bytes::Bytes;
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};

use kernel_rpc::{
    //
    create_memory_transport,
    Error,
    KernelClient,
    KernelConfig,
    MemoryRemote,
};

#[cfg(feature = "logging")]
fn init_logging() {
    // ---
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn config() -> KernelConfig {
    // ---
    KernelConfig::new("wss://hub.local/user/user-1", "kernel-1").with_username("user-1")
}

/// Build an inbound frame the way the backend would: the submitted
/// request's identifiers echoed in `parent_header`.
fn reply_frame(msg_type: &str, parent_msg_id: &str, parent_session: &str, text: &str) -> Bytes {
    // ---
    let value = json!({
        "header": {
            "msg_id": "reply-1",
            "msg_type": msg_type,
            "username": "kernel",
            "session": "kernel-side-session",
            "version": "5.2",
        },
        "msg_type": msg_type,
        "parent_header": {
            "msg_id": parent_msg_id,
            "msg_type": "execute_request",
            "username": "user-1",
            "session": parent_session,
            "version": "5.2",
        },
        "metadata": {},
        "content": { "name": "stdout", "text": text, "code": "", "execution_count": 1 },
        "buffers": [],
        "channel": "iopub",
    });

    Bytes::from(serde_json::to_vec(&value).expect("test frame must serialize"))
}

/// Receive and decode the next frame the client sent.
async fn sent_request(remote: &mut MemoryRemote) -> Value {
    // ---
    let raw = timeout(Duration::from_secs(1), remote.outbound.recv())
        .await
        .expect("timed out waiting for an outbound frame")
        .expect("outbound channel closed");

    serde_json::from_slice(&raw).expect("outbound frame must be JSON")
}

fn request_ids(request: &Value) -> (String, String) {
    // ---
    let msg_id = request["header"]["msg_id"].as_str().expect("msg_id missing");
    let session = request["header"]["session"].as_str().expect("session missing");
    (msg_id.to_string(), session.to_string())
}

#[tokio::test]
async fn resolves_with_first_matching_frame_and_ignores_noise() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    // Arrange
    // ---
    let (transport, mut remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    let exec = tokio::spawn({
        let client = client.clone();
        async move { client.execute("echo hi").await }
    });

    let request = sent_request(&mut remote).await;
    let (msg_id, session) = request_ids(&request);

    // ---
    // Act: three frames that must not resolve the wait, then the match.
    // ---
    remote
        .inbound
        .send(reply_frame("status", &msg_id, &session, ""))
        .await
        .unwrap();
    remote
        .inbound
        .send(reply_frame("stream", "someone-elses-msg", &session, "not ours"))
        .await
        .unwrap();
    remote
        .inbound
        .send(reply_frame("stream", &msg_id, "someone-elses-session", "not ours"))
        .await
        .unwrap();
    remote
        .inbound
        .send(reply_frame("stream", &msg_id, &session, "hi\r\n"))
        .await
        .unwrap();

    // ---
    // Assert
    // ---
    let output = timeout(Duration::from_secs(1), exec)
        .await
        .expect("execute should have resolved")
        .expect("execute task panicked")
        .expect("execute failed");
    assert_eq!(output, "hi\r\n");

    // A stale duplicate of the match must not leak into the next request.
    remote
        .inbound
        .send(reply_frame("stream", &msg_id, &session, "stale"))
        .await
        .unwrap();

    let exec = tokio::spawn({
        let client = client.clone();
        async move { client.execute("echo again").await }
    });
    let request = sent_request(&mut remote).await;
    let (msg_id, session) = request_ids(&request);

    remote
        .inbound
        .send(reply_frame("stream", &msg_id, &session, "again\r\n"))
        .await
        .unwrap();

    let output = timeout(Duration::from_secs(1), exec)
        .await
        .expect("execute should have resolved")
        .expect("execute task panicked")
        .expect("execute failed");
    assert_eq!(output, "again\r\n");
}

#[tokio::test]
async fn request_frame_carries_backend_contract() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, mut remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    let _exec = tokio::spawn({
        let client = client.clone();
        async move { client.execute("jupyter kernelspec list").await }
    });

    let request = sent_request(&mut remote).await;

    assert_eq!(request["msg_type"], "execute_request");
    assert_eq!(request["header"]["msg_type"], "execute_request");
    assert_eq!(request["header"]["username"], "user-1");
    assert_eq!(request["header"]["version"], "5.2");
    assert_eq!(request["channel"], "shell");
    assert_eq!(request["content"]["code"], "!jupyter kernelspec list");
    assert_eq!(request["parent_header"], json!({}));
}

#[tokio::test]
async fn fresh_identifiers_per_invocation() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, mut remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    let mut seen = std::collections::HashSet::new();

    for _ in 0..3 {
        let exec = tokio::spawn({
            let client = client.clone();
            async move { client.execute("true").await }
        });

        let request = sent_request(&mut remote).await;
        let (msg_id, session) = request_ids(&request);
        assert!(seen.insert((msg_id.clone(), session.clone())));

        remote
            .inbound
            .send(reply_frame("stream", &msg_id, &session, ""))
            .await
            .unwrap();
        timeout(Duration::from_secs(1), exec)
            .await
            .expect("execute should have resolved")
            .expect("execute task panicked")
            .expect("execute failed");
    }
}

#[tokio::test]
async fn partial_match_leaves_request_outstanding() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, mut remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    let mut exec = tokio::spawn({
        let client = client.clone();
        async move { client.execute("echo hi").await }
    });

    let request = sent_request(&mut remote).await;
    let (msg_id, session) = request_ids(&request);

    remote
        .inbound
        .send(reply_frame("stream", &msg_id, "wrong-session", "partial"))
        .await
        .unwrap();
    remote
        .inbound
        .send(reply_frame("stream", "wrong-msg", &session, "partial"))
        .await
        .unwrap();

    // Still waiting: neither partial match may resolve the call.
    assert!(timeout(Duration::from_millis(100), &mut exec).await.is_err());

    remote
        .inbound
        .send(reply_frame("stream", &msg_id, &session, "done"))
        .await
        .unwrap();

    let output = timeout(Duration::from_secs(1), exec)
        .await
        .expect("execute should have resolved")
        .expect("execute task panicked")
        .expect("execute failed");
    assert_eq!(output, "done");
}

#[tokio::test]
async fn connection_close_fails_the_wait() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, mut remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    let exec = tokio::spawn({
        let client = client.clone();
        async move { client.execute("echo hi").await }
    });

    // Consume the request, then close the backend without replying.
    let _request = sent_request(&mut remote).await;
    drop(remote);

    let err = timeout(Duration::from_secs(1), exec)
        .await
        .expect("execute must fail, not hang")
        .expect("execute task panicked")
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));

    // The connection is dead for good; later calls fail fast.
    let err = timeout(Duration::from_secs(1), client.execute("true"))
        .await
        .expect("execute must fail, not hang")
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed | Error::Send(_)));
}

#[tokio::test]
async fn malformed_frame_fails_the_wait() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, mut remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    let exec = tokio::spawn({
        let client = client.clone();
        async move { client.execute("echo hi").await }
    });

    let _request = sent_request(&mut remote).await;

    remote
        .inbound
        .send(Bytes::from_static(b"this is not a frame"))
        .await
        .unwrap();

    let err = timeout(Duration::from_secs(1), exec)
        .await
        .expect("execute must fail, not hang")
        .expect("execute task panicked")
        .unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn second_request_rejected_while_one_is_outstanding() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, mut remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    let exec = tokio::spawn({
        let client = client.clone();
        async move { client.execute("sleep 5").await }
    });

    let request = sent_request(&mut remote).await;

    let err = timeout(Duration::from_secs(1), client.execute("echo no"))
        .await
        .expect("rejection should be immediate")
        .unwrap_err();
    assert!(matches!(err, Error::RequestInFlight));

    // The outstanding request is unaffected.
    let (msg_id, session) = request_ids(&request);
    remote
        .inbound
        .send(reply_frame("stream", &msg_id, &session, "ok"))
        .await
        .unwrap();

    let output = timeout(Duration::from_secs(1), exec)
        .await
        .expect("execute should have resolved")
        .expect("execute task panicked")
        .expect("execute failed");
    assert_eq!(output, "ok");
}

#[tokio::test]
async fn opt_in_timeout_expires_and_frees_the_connection() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, mut remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    let err = client
        .execute_with_timeout("echo hi", Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));

    let stale = sent_request(&mut remote).await;
    let (stale_msg_id, stale_session) = request_ids(&stale);

    // A reply to the abandoned request is discarded, and the connection
    // remains usable for the next one.
    remote
        .inbound
        .send(reply_frame("stream", &stale_msg_id, &stale_session, "late"))
        .await
        .unwrap();

    let exec = tokio::spawn({
        let client = client.clone();
        async move { client.execute("echo hi").await }
    });

    let request = sent_request(&mut remote).await;
    let (msg_id, session) = request_ids(&request);
    remote
        .inbound
        .send(reply_frame("stream", &msg_id, &session, "fresh"))
        .await
        .unwrap();

    let output = timeout(Duration::from_secs(1), exec)
        .await
        .expect("execute should have resolved")
        .expect("execute task panicked")
        .expect("execute failed");
    assert_eq!(output, "fresh");
}

#[tokio::test]
async fn send_failure_reported_without_partial_result() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (transport, remote) = create_memory_transport();
    let client = KernelClient::with_transport(transport, config())
        .await
        .expect("client construction failed");

    // Drop only the backend's receiving half; the inbound path stays open
    // so the failure comes from the write, not from a closed connection.
    let MemoryRemote { outbound, inbound } = remote;
    drop(outbound);

    let err = timeout(Duration::from_secs(1), client.execute("echo hi"))
        .await
        .expect("send failure should be immediate")
        .unwrap_err();
    assert!(matches!(err, Error::Send(_)));

    drop(inbound);
}
