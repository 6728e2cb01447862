//! HTTP-level tests: error sanitisation and a full Ollama round trip.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use straylight::providers::ollama::OllamaProvider;
use straylight::providers::{check_http_response, CompletionRequest, LlmProvider, Message, ProviderError};

/// Serve one canned HTTP response and return the base URL.
async fn serve_once(status_line: &str, content_type: &str, body: &str) -> String {
    let listener_result = TcpListener::bind("127.0.0.1:0").await;
    assert!(listener_result.is_ok());
    let listener = match listener_result {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };

    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let status_line_owned = status_line.to_owned();
    let content_type_owned = content_type.to_owned();
    let body_owned = body.to_owned();
    tokio::spawn(async move {
        let accepted = listener.accept().await;
        if let Ok((mut socket, _)) = accepted {
            let mut read_buf = [0_u8; 8192];
            let _ = socket.read(&mut read_buf).await;

            let response = format!(
                "HTTP/1.1 {status_line_owned}\r\nContent-Type: {content_type_owned}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body_owned}",
                body_owned.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    format!("http://{addr}")
}

async fn expect_status_error(url: String) -> ProviderError {
    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };
    match check_http_response(response).await {
        Ok(_) => panic!("response should fail on non-success status"),
        Err(err) => err,
    }
}

#[tokio::test]
async fn check_http_response_redacts_token_like_values() {
    let raw_token = "sk-abcdefghijklmnopqrstuvwxyz1234";
    let body = format!("error token={raw_token}");
    let url = serve_once("500 Internal Server Error", "text/plain", &body).await;

    match expect_status_error(url).await {
        ProviderError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert!(!body.contains(raw_token));
            assert!(body.contains("[REDACTED]"));
        }
        other => panic!("expected http status error, got: {other}"),
    }
}

#[tokio::test]
async fn check_http_response_truncates_long_error_body() {
    let body = "x".repeat(400);
    let url = serve_once("500 Internal Server Error", "text/plain", &body).await;

    match expect_status_error(url).await {
        ProviderError::HttpStatus { body, .. } => {
            assert!(body.ends_with("...[truncated]"));
        }
        other => panic!("expected http status error, got: {other}"),
    }
}

#[tokio::test]
async fn ollama_complete_round_trip() {
    let reply = serde_json::json!({
        "model": "mistral",
        "message": {"role": "assistant", "content": "{\"from\": \"Delhi\"}"},
        "done_reason": "stop",
        "prompt_eval_count": 80,
        "eval_count": 12
    });
    let base = serve_once("200 OK", "application/json", &reply.to_string()).await;
    let provider =
        OllamaProvider::new("ollama/mistral".to_owned(), "mistral".to_owned()).with_base_url(&base);

    let request = CompletionRequest {
        messages: vec![Message::user("extract")],
        temperature: None,
        max_tokens: None,
    };
    let response = match provider.complete(request).await {
        Ok(response) => response,
        Err(err) => panic!("completion should succeed: {err}"),
    };
    assert_eq!(response.text, "{\"from\": \"Delhi\"}");
    assert_eq!(response.usage.input_tokens, 80);
    assert_eq!(response.model, "mistral");
}

#[tokio::test]
async fn ollama_complete_surfaces_http_errors() {
    let base = serve_once("404 Not Found", "application/json", r#"{"error":"model 'mistral' not found"}"#).await;
    let provider =
        OllamaProvider::new("ollama/mistral".to_owned(), "mistral".to_owned()).with_base_url(&base);

    let request = CompletionRequest {
        messages: vec![Message::user("extract")],
        temperature: None,
        max_tokens: None,
    };
    match provider.complete(request).await {
        Err(ProviderError::HttpStatus { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("expected http status error, got: {other:?}"),
    }
}
