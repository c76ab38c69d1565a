use mockito::Matcher;
use newsdigest::llm::remote::RemoteLlmProvider;
use newsdigest::llm::{LlmProvider, LlmRequest};
use serde_json::json;

#[tokio::test]
async fn test_remote_provider_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer fake-api-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "deepseek-chat",
            "messages": [
                {"role": "system", "content": "You are an editor."},
                {"role": "user", "content": "Test prompt"}
            ],
            "max_tokens": 4000,
            "temperature": 0.3
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "model": "deepseek-chat",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "<b>📌 AI</b>\n▸ <b>Headline</b>"
                    },
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": 5,
                    "total_tokens": 15
                }
            }"#,
        )
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "deepseek-chat");

    let request = LlmRequest {
        system: Some("You are an editor.".to_string()),
        prompt: "Test prompt".to_string(),
        max_tokens: Some(4000),
        temperature: Some(0.3),
        timeout_seconds: Some(10),
    };

    let result = provider.generate(request).await;

    assert!(result.is_ok());
    let response = result.unwrap();
    assert_eq!(response.content, "<b>📌 AI</b>\n▸ <b>Headline</b>");
    assert_eq!(response.usage.prompt_tokens, 10);
    assert_eq!(response.usage.completion_tokens, 5);
    assert_eq!(response.usage.total_tokens, 15);
    assert_eq!(response.model, "deepseek-chat");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_without_usage_block() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "deepseek-chat");
    let response = provider
        .generate(LlmRequest {
            prompt: "Test".to_string(),
            ..Default::default()
        })
        .await
        .expect("response");

    assert_eq!(response.content, "ok");
    assert_eq!(response.usage.total_tokens, 0);
    assert_eq!(response.model, "deepseek-chat");
}

#[tokio::test]
async fn test_remote_provider_error_handling() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": {"message": "Rate limit exceeded"}}"#)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "deepseek-chat");

    let result = provider
        .generate(LlmRequest {
            prompt: "Test".to_string(),
            ..Default::default()
        })
        .await;

    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("429"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_no_choices() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"model": "deepseek-chat", "choices": []}"#)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "deepseek-chat");
    let result = provider
        .generate(LlmRequest {
            prompt: "Test".to_string(),
            ..Default::default()
        })
        .await;

    assert!(result.unwrap_err().to_string().contains("no choices"));
}

#[tokio::test]
async fn test_remote_provider_timeout() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"too late")
        })
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "deepseek-chat");

    let request = LlmRequest {
        prompt: "Test".to_string(),
        timeout_seconds: Some(1),
        ..Default::default()
    };

    let result = provider.generate(request).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("timed out"));
}
