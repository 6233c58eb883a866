#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use mistral_connector::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "mistral-small-latest";

    fn service(server: &MockServer) -> MistralChatCompletion {
        let client = Mistral::builder()
            .api_key("test-key")
            .base_url(server.uri())
            .build();
        MistralChatCompletion::new(MODEL, client)
    }

    fn history() -> ChatHistory {
        let mut history = ChatHistory::new();
        history.add_system_message("You are a friendly greeter.");
        history.add_user_message("Say hello");
        history
    }

    fn completion_body(content: &str) -> Value {
        json!({
            "id": "cmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": MODEL,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "total_tokens": 16, "completion_tokens": 4}
        })
    }

    /// Event stream carrying `fragments` for choice 0, then a stop event and `[DONE]`
    fn event_stream_body(fragments: &[&str]) -> String {
        let mut body = String::new();
        for (i, fragment) in fragments.iter().enumerate() {
            let role = if i == 0 { json!("assistant") } else { Value::Null };
            let event = json!({
                "id": "cmpl-1",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000,
                "model": MODEL,
                "choices": [{"index": 0, "delta": {"role": role, "content": fragment}, "finish_reason": null}]
            });
            body.push_str(&format!("data: {event}\n\n"));
        }
        let stop = json!({
            "id": "cmpl-1",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": MODEL,
            "choices": [{"index": 0, "delta": {"content": ""}, "finish_reason": "stop"}]
        });
        body.push_str(&format!("data: {stop}\n\ndata: [DONE]\n\n"));
        body
    }

    async fn mount_stream(server: &MockServer, body: String) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_generate_chat_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header_regex("user-agent", "^mistral-connector/"))
            .and(body_partial_json(json!({
                "model": MODEL,
                "stream": false,
                "max_tokens": 1024,
                "tools": []
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hello!")))
            .expect(1)
            .mount(&server)
            .await;

        let message = service(&server)
            .generate_chat_response(&history(), None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(message.role, AuthorRole::Assistant);
        assert_eq!(message.text, "Hello!");
        assert_eq!(message.model_id, MODEL);
        assert_eq!(
            message.usage,
            Some(Usage {
                prompt_tokens: 12,
                completion_tokens: 4,
                total_tokens: 16
            })
        );
    }

    #[tokio::test]
    async fn test_system_only_history_is_sent_as_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": "Write a haiku."}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Leaves fall")))
            .expect(1)
            .mount(&server)
            .await;

        let history: ChatHistory = vec![ConversationTurn::system("Write a haiku.")].into();
        let message = service(&server)
            .generate_chat_response(&history, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(message.text, "Leaves fall");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_choices_is_a_shape_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cmpl-1",
                "object": "chat.completion",
                "created": 1,
                "model": MODEL,
                "choices": []
            })))
            .mount(&server)
            .await;

        let err = service(&server)
            .generate_chat_response(&history(), None, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MistralError::ResponseShape(_)));
        assert!(err.is_shape_error());
    }

    #[tokio::test]
    async fn test_unauthorized_non_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid key"}"#))
            .mount(&server)
            .await;

        let err = service(&server)
            .generate_chat_response(&history(), None, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(401));
        assert!(err.raw_body().unwrap().contains("invalid key"));
        assert!(err.to_string().contains("invalid key"));
    }

    #[tokio::test]
    async fn test_unauthorized_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid key"}"#))
            .mount(&server)
            .await;

        let service = service(&server);
        let mut history = history();
        let results: Vec<_> = service
            .stream_chat_response(&mut history, None, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        let err = results.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert!(err.raw_body().unwrap().contains("invalid key"));
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_appends_assembled_turn() {
        let server = MockServer::start().await;
        mount_stream(&server, event_stream_body(&["Hel", "lo", " there"])).await;

        let service = service(&server);
        let mut history = history();
        let deltas: Vec<StreamDelta> = service
            .stream_chat_response(&mut history, None, CancellationToken::new())
            .map(|d| d.unwrap())
            .collect()
            .await;

        assert_eq!(deltas.len(), 4);
        assert_eq!(deltas[0].role.as_deref(), Some("assistant"));
        assert_eq!(deltas[3].finish_reason.as_deref(), Some("stop"));

        assert_eq!(history.len(), 3);
        let appended = history.last().unwrap();
        assert_eq!(appended.role, AuthorRole::Assistant);
        assert_eq!(appended.text, "Hello there");
        assert_eq!(appended.model_id.as_deref(), Some(MODEL));
    }

    #[tokio::test]
    async fn test_streamed_text_matches_non_streamed_content() {
        let server = MockServer::start().await;
        let fragments = ["The ", "quick ", "brown ", "fox."];
        let full: String = fragments.concat();

        mount_stream(&server, event_stream_body(&fragments)).await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&full)))
            .mount(&server)
            .await;

        let service = service(&server);
        let non_streamed = service
            .generate_chat_response(&history(), None, CancellationToken::new())
            .await
            .unwrap();

        let mut history = history();
        let streamed: String = service
            .stream_chat_response(&mut history, None, CancellationToken::new())
            .map(|d| d.unwrap())
            .filter(|d| std::future::ready(d.choice_index == 0))
            .map(|d| d.content)
            .collect::<Vec<_>>()
            .await
            .concat();

        assert_eq!(streamed, non_streamed.text);
        assert_eq!(history.last().unwrap().text, non_streamed.text);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream() {
        let server = MockServer::start().await;
        mount_stream(&server, event_stream_body(&["first", "second", "third"])).await;

        let service = service(&server);
        let mut history = history();
        let cancel = CancellationToken::new();
        let mut received = Vec::new();
        let mut failure = None;

        {
            let mut stream = service.stream_chat_response(&mut history, None, cancel.clone());
            while let Some(item) = stream.next().await {
                match item {
                    Ok(delta) => {
                        received.push(delta);
                        cancel.cancel();
                    }
                    Err(err) => failure = Some(err),
                }
            }
        }

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].content, "first");
        assert!(failure.unwrap().is_cancelled());
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_before_send_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("unused")))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service(&server)
            .generate_chat_response(&history(), None, cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_malformed_event_ends_stream_without_append() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"ok\"},\"finish_reason\":null}]}\n\
                    data: {broken\n"
            .to_string();
        mount_stream(&server, body).await;

        let service = service(&server);
        let mut history = history();
        let results: Vec<_> = service
            .stream_chat_response(&mut history, None, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_shape_error());
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_text_uses_small_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "max_tokens": 256,
                "messages": [{"role": "user", "content": "Complete: once upon"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("a time")))
            .expect(1)
            .mount(&server)
            .await;

        let message = service(&server)
            .generate_text("Complete: once upon", None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(message.text, "a time");
    }

    #[tokio::test]
    async fn test_stream_text() {
        let server = MockServer::start().await;
        mount_stream(&server, event_stream_body(&["a ", "time"])).await;

        let text: String = service(&server)
            .stream_text("Complete: once upon", None, CancellationToken::new())
            .map(|d| d.unwrap().content)
            .collect::<Vec<_>>()
            .await
            .concat();

        assert_eq!(text, "a time");
    }

    #[tokio::test]
    async fn test_explicit_settings_reach_the_wire() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "temperature": 0.1,
                "top_p": 1.0,
                "max_tokens": 32,
                "random_seed": 99,
                "safe_prompt": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let settings = ExecutionSettings::builder()
            .temperature(0.0)
            .top_p(3.0)
            .max_tokens(32)
            .seed(99)
            .safe_prompt(true)
            .build();

        service(&server)
            .generate_chat_response(&history(), Some(&settings), CancellationToken::new())
            .await
            .unwrap();
    }
}
