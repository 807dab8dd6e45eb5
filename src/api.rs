//! # Generation glue
//!
//! Thin layer between retrieval and the OpenAI-compatible generation
//! endpoint: grounds the store assistant's prompt with the retrieved
//! context and returns the answer together with the context that was used.
//!
//! This is the only layer whose failures are surfaced to the caller
//! ([`RagError::Generation`]); everything below it degrades silently.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
};
use tracing::debug;

use crate::config::FreshRagConfig;
use crate::error::RagError;
use crate::orchestrator::RagState;
use crate::retriever;

/// A generated answer plus the context block it was grounded with.
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub answer: String,
    pub context_used: String,
}

fn create_client(config: &FreshRagConfig) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_key(config.api_key.clone())
        .with_api_base(config.api_base.clone());
    Client::with_config(openai_config)
}

/// Build the FreshFood assistant prompt around the retrieved context.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Bạn là trợ lý ảo chuyên nghiệp của cửa hàng thực phẩm sạch FreshFood.\n\
         \n\
         DỮ LIỆU TÌM THẤY TỪ CỬA HÀNG:\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         \n\
         YÊU CẦU TRẢ LỜI:\n\
         1. Dựa CHÍNH XÁC vào dữ liệu trên để trả lời.\n\
         2. Nếu khách hỏi món ăn, hãy gợi ý món dựa trên nguyên liệu có trong dữ liệu \
         (ví dụ: có thịt heo -> gợi ý thịt kho tàu).\n\
         3. Đối với sản phẩm, tuyệt đối KHÔNG bịa đặt giá cả nếu không có trong dữ liệu.\n\
         4. Hãy tư vấn nhiệt tình cho khách hàng về tư vấn bữa ăn, sức khỏe, đời sống, ...\n\
         5. Trả lời ngắn gọn, thân thiện, sử dụng Emoji phù hợp 🌿🍎.\n\
         \n\
         Câu hỏi của khách: {question}"
    )
}

/// Retrieve grounding context for `question` and ask the generation model.
///
/// # Errors
/// [`RagError::Generation`] if the generation request fails. Retrieval
/// problems never error here: they show up as a sentinel or empty context.
pub async fn answer(
    config: &FreshRagConfig,
    state: &RagState,
    question: &str,
) -> Result<ChatAnswer, RagError> {
    let context = retriever::retrieve_context(state, question, config.top_k);
    let prompt = build_prompt(&context, question);

    let client = create_client(config);
    let request = CreateChatCompletionRequestArgs::default()
        .model(config.model.clone())
        .messages(vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompt),
                name: None,
            },
        )])
        .build()?;

    debug!(model = %config.model, "sending generation request");
    let response = client.chat().create(request).await?;

    let mut answer = String::new();
    for choice in &response.choices {
        if let Some(content) = &choice.message.content {
            answer.push_str(content);
        }
    }

    Ok(ChatAnswer {
        answer,
        context_used: context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn config_against(base_url: String) -> FreshRagConfig {
        FreshRagConfig {
            api_key: "test-key".to_string(),
            api_base: base_url,
            model: "gemini-2.5-flash".to_string(),
            embedding_model: "test/keyword-embedder".to_string(),
            data_dir: "./data".to_string(),
            cache_dir: "./cache".to_string(),
            top_k: 3,
        }
    }

    #[test]
    fn prompt_carries_context_and_question() {
        let prompt = build_prompt("[SẢN PHẨM] Táo", "Táo giá bao nhiêu?");
        assert!(prompt.contains("[SẢN PHẨM] Táo"));
        assert!(prompt.contains("Câu hỏi của khách: Táo giá bao nhiêu?"));
        assert!(prompt.contains("FreshFood"));
    }

    #[tokio::test]
    async fn answer_returns_generated_text_and_context() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        r#"{
                          "id": "chatcmpl-test",
                          "object": "chat.completion",
                          "created": 1700000000,
                          "model": "gemini-2.5-flash",
                          "choices": [{
                            "index": 0,
                            "message": {"role": "assistant", "content": "Dạ, cửa hàng có táo ạ 🍎"},
                            "finish_reason": "stop",
                            "logprobs": null
                          }]
                        }"#,
                    );
            })
            .await;

        let config = config_against(server.base_url());
        // An unready state grounds the prompt with the startup sentinel.
        let chat = answer(&config, &RagState::Uninitialized, "Có táo không?")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(chat.answer, "Dạ, cửa hàng có táo ạ 🍎");
        assert_eq!(chat.context_used, retriever::STARTUP_SENTINEL);
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("upstream exploded");
            })
            .await;

        let config = config_against(server.base_url());
        let result = answer(&config, &RagState::Uninitialized, "Có táo không?").await;
        assert!(matches!(result, Err(RagError::Generation(_))));
    }
}
