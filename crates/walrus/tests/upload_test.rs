use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use walrus::{WalrusClient, WalrusConfig};

const SUCCESS_BODY: &str = r#"{"newlyCreated":{"blobObject":{"blobId":"test-blob"}}}"#;

/// Minimal relay stand-in: answers each PUT with 500 until
/// `failures_before_success` requests have been seen, then 200 with a
/// newlyCreated payload. Counts every request it serves.
async fn spawn_mock_relay(failures_before_success: usize) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let attempt = counter.fetch_add(1, Ordering::SeqCst);

            // Drain the request: headers, then content-length body bytes.
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let (header_end, content_length) = loop {
                let Ok(n) = stream.read(&mut chunk).await else {
                    break (0, 0);
                };
                if n == 0 {
                    break (buf.len(), 0);
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&buf[..pos]);
                    let content_length = headers
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    break (pos + 4, content_length);
                }
            };
            while buf.len() < header_end + content_length {
                let Ok(n) = stream.read(&mut chunk).await else { break };
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = if attempt < failures_before_success {
                "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    .to_string()
            } else {
                format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    SUCCESS_BODY.len(),
                    SUCCESS_BODY
                )
            };
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.flush().await;
        }
    });

    (format!("http://{}", addr), requests)
}

fn test_client(relay_url: String) -> WalrusClient {
    WalrusClient::with_config(WalrusConfig {
        relay_url,
        aggregator_url: "http://127.0.0.1:1".to_string(),
        max_retries: 3,
        retry_delay: std::time::Duration::from_millis(10),
    })
}

#[tokio::test]
async fn upload_succeeds_on_third_attempt() {
    let (relay_url, requests) = spawn_mock_relay(2).await;
    let client = test_client(relay_url);

    let result = client.upload(b"hello walrus".to_vec()).await.unwrap();

    assert_eq!(result.blob_id, "test-blob");
    assert_eq!(result.uri, "walrus://test-blob");
    assert_eq!(result.hash, "test-blob");
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn upload_stops_at_the_retry_bound() {
    // A relay that never recovers: every request is a 500.
    let (relay_url, requests) = spawn_mock_relay(usize::MAX).await;
    let client = test_client(relay_url);

    let err = client.upload(b"hello walrus".to_vec()).await.unwrap_err();

    assert!(err.to_string().contains("after 3 attempts"), "{}", err);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn upload_succeeds_immediately_on_healthy_relay() {
    let (relay_url, requests) = spawn_mock_relay(0).await;
    let client = test_client(relay_url);

    let result = client.upload(b"hello walrus".to_vec()).await.unwrap();

    assert_eq!(result.blob_id, "test-blob");
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}
