//! Integration tests for the Goblln library.
//! Tests that talk to a server require GOBLLN_OLLAMA_HOST in the environment.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use goblln::{
        Backend, ChatRequest, ChatStream, DEFAULT_MESSAGE, Goblln, Interpretation, InterpreterMode,
        Ollama, OllamaOptions, Result, TokenEvent, parse,
    };

    /// Answers every request with the same fragments.
    struct Canned(Vec<&'static str>);

    #[async_trait::async_trait]
    impl Backend for Canned {
        async fn chat(&self, _: ChatRequest) -> Result<ChatStream> {
            Ok(ChatStream::from_fragments(self.0.clone()))
        }
    }

    fn live_client() -> Option<(Ollama, String)> {
        let host = std::env::var("GOBLLN_OLLAMA_HOST").ok()?;
        let model = std::env::var("GOBLLN_OLLAMA_MODEL").unwrap_or_else(|_| "gemma2".to_string());
        let options = OllamaOptions::new().with_host(host).with_model(model.clone());
        let client = Ollama::new(&options).expect("Failed to create client");
        Some((client, model))
    }

    #[tokio::test]
    async fn test_code_generation_through_public_api() {
        let goblln = Goblln::new(
            Canned(vec![
                "\n",
                "Sure! Here is the code:\n",
                "```rust\n",
                "fn add(a: i32, b: i32) -> i32 {\n",
                "    a + b\n",
                "}\n",
                "```",
                "\nThis adds two numbers.",
            ]),
            "gemma2",
        );
        let mut events: Vec<TokenEvent> = Vec::new();

        let code = goblln
            .generate("add two numbers", Some("rust"), Some(&mut events))
            .await
            .unwrap();

        assert_eq!(code, "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}");
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| !e.token.contains("```")));
    }

    #[tokio::test]
    async fn test_text_answer_parses_into_blocks() {
        let goblln = Goblln::new(
            Canned(vec!["Use this:\n", "```sh\n", "ls -la\n", "```\n", "Done"]),
            "gemma2",
        );
        let answer = goblln.chat("list files", None).await.unwrap();
        let parsed = parse(&answer);
        assert_eq!(parsed.code, "ls -la");
        assert_eq!(parsed.text, "Use this:\n\nDone");
    }

    #[tokio::test]
    async fn test_fix_keeps_source_when_nothing_to_change() {
        let goblln = Goblln::new(
            Canned(vec!["The", " code", " is", " already", " correct", "."]),
            "gemma2",
        );
        let source = "fn main() {}";
        assert_eq!(goblln.fix(source, Some("rust"), None, None).await.unwrap(), source);
        assert_eq!(goblln.chat("?", None).await.unwrap(), DEFAULT_MESSAGE);
    }

    #[tokio::test]
    async fn test_live_chat() {
        let Some((client, model)) = live_client() else {
            eprintln!("Skipping test: GOBLLN_OLLAMA_HOST not set");
            return;
        };
        let goblln = Goblln::new(client, model).with_timeout(Some(Duration::from_secs(120)));

        let outcome = goblln
            .run("Say 'test passed'", InterpreterMode::Text, None)
            .await;
        assert!(outcome.is_ok(), "Request should succeed against a live server");
    }

    #[tokio::test]
    async fn test_live_stream_abort() {
        let Some((client, model)) = live_client() else {
            eprintln!("Skipping test: GOBLLN_OLLAMA_HOST not set");
            return;
        };
        let mut stream = client
            .chat(ChatRequest::single_turn(model, "Count to 100"))
            .await
            .expect("Stream request should succeed");
        assert!(stream.next_event().await.is_some());
        stream.abort();
        stream.abort();
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_live_missing_model() {
        let Some((client, _)) = live_client() else {
            eprintln!("Skipping test: GOBLLN_OLLAMA_HOST not set");
            return;
        };
        let goblln = Goblln::new(client, "no-such-model-goblln");
        match goblln.run("hi", InterpreterMode::Text, None).await {
            Err(err) => assert!(err.is_not_found()),
            Ok(Interpretation::Answer(answer)) => panic!("unexpected answer: {answer}"),
            Ok(other) => panic!("unexpected outcome: {other:?}"),
        }
    }
}
