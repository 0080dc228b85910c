//! Gemini client contract tests.
//!
//! These tests pin the HTTP shape of the Generative Language API calls:
//! - request bodies for text and speech
//! - the API key header
//! - response parsing for text parts and inline audio
//! - HTTP error mapping

use base64::Engine;
use sahayak::backend::{
    GeminiClient, GeminiConfig, GenerateRequest, SpeechRequest, SpeechSynthesizer, TextGenerator,
    Turn,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEXT_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";
const SPEECH_PATH: &str = "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig::new("test-key").with_base_url(server.uri()))
        .expect("client builds")
}

fn text_response(parts: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "role": "model", "parts": parts } }]
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Text generation
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_request_carries_history_prompt_and_instruction() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "Be gentle." }] },
            "contents": [
                { "role": "user", "parts": [{ "text": "hello" }] },
                { "role": "model", "parts": [{ "text": "Hi, I'm here." }] },
                { "role": "user", "parts": [{ "text": "I feel tired" }] }
            ]
        })))
        .respond_with(text_response(json!([{ "text": "That sounds heavy." }])))
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![Turn::user("hello"), Turn::model("Hi, I'm here.")];
    let reply = client(&server)
        .generate(GenerateRequest {
            system_instruction: "Be gentle.",
            history: &history,
            prompt: "I feel tired",
        })
        .await
        .expect("reply");
    assert_eq!(reply, "That sounds heavy.");
}

#[tokio::test]
async fn text_parts_are_concatenated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(text_response(json!([
            { "text": "First part. " },
            { "text": "Second part." }
        ])))
        .mount(&server)
        .await;

    let reply = client(&server)
        .generate(GenerateRequest {
            system_instruction: "",
            history: &[],
            prompt: "hi",
        })
        .await
        .expect("reply");
    assert_eq!(reply, "First part. Second part.");
}

#[tokio::test]
async fn empty_candidate_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate(GenerateRequest {
            system_instruction: "",
            history: &[],
            prompt: "hi",
        })
        .await
        .expect_err("no text");
    assert!(err.to_string().contains("no text"));
}

#[tokio::test]
async fn unauthorized_maps_to_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate(GenerateRequest {
            system_instruction: "",
            history: &[],
            prompt: "hi",
        })
        .await
        .expect_err("403");
    let msg = err.to_string();
    assert!(msg.contains("authentication failed"), "got: {msg}");
    assert!(msg.contains("API key not valid"), "got: {msg}");
}

#[tokio::test]
async fn rate_limit_and_server_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client(&server);
    let request = GenerateRequest {
        system_instruction: "",
        history: &[],
        prompt: "hi",
    };
    let first = client.generate(request).await.expect_err("429");
    assert!(first.to_string().contains("rate limited"));
    let second = client.generate(request).await.expect_err("500");
    assert!(second.to_string().contains("HTTP 500: boom"));
}

#[tokio::test]
async fn unreachable_host_is_an_error() {
    let config = GeminiConfig::new("test-key").with_base_url("http://127.0.0.1:9");
    let client = GeminiClient::new(config).expect("client builds");
    let result = client
        .generate(GenerateRequest {
            system_instruction: "",
            history: &[],
            prompt: "hi",
        })
        .await;
    assert!(result.is_err());
}

#[test]
fn empty_api_key_is_rejected() {
    let err = GeminiClient::new(GeminiConfig::new("  ")).expect_err("empty key");
    assert_eq!(err.code(), "CONFIG_INVALID");
}

// ────────────────────────────────────────────────────────────────────────────
// Speech synthesis
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn speech_request_uses_voice_and_preamble() {
    let server = MockServer::start().await;
    let pcm = vec![1u8, 2, 3, 4];
    let encoded = base64::engine::general_purpose::STANDARD.encode(&pcm);

    Mock::given(method("POST"))
        .and(path(SPEECH_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "text": "Say calmly and gently: I hear you." }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Kore" } }
                }
            }
        })))
        .respond_with(text_response(json!([
            { "inlineData": { "mimeType": "audio/L16;rate=24000", "data": encoded } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let audio = client(&server)
        .synthesize(SpeechRequest {
            text: "I hear you.",
            voice: "Kore",
        })
        .await
        .expect("audio");
    assert_eq!(audio, Some(pcm));
}

#[tokio::test]
async fn missing_audio_payload_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SPEECH_PATH))
        .respond_with(text_response(json!([{ "text": "no audio here" }])))
        .mount(&server)
        .await;

    let audio = client(&server)
        .synthesize(SpeechRequest {
            text: "hello",
            voice: "Kore",
        })
        .await
        .expect("response parses");
    assert!(audio.is_none());
}

#[tokio::test]
async fn corrupt_audio_payload_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SPEECH_PATH))
        .respond_with(text_response(json!([
            { "inlineData": { "data": "***not base64***" } }
        ])))
        .mount(&server)
        .await;

    let result = client(&server)
        .synthesize(SpeechRequest {
            text: "hello",
            voice: "Kore",
        })
        .await;
    assert!(result.is_err());
}
