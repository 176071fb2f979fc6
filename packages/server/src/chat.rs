//! `POST /api/chat`: one reporter turn streamed as server-sent events.
//!
//! The first event carries the conversation id so the client can send
//! follow-ups. Progress, tool and report events follow, and the stream
//! ends after the `answer` or `error` event.

use actix_web::web::Bytes;
use actix_web::{HttpResponse, web};
use detective_ai::{AgentEvent, TURN_FAILED_MESSAGE};
use detective_server_models::{ApiError, ChatRequest};
use tokio::sync::mpsc;

use crate::{AppState, ServerError};

/// Formats one SSE frame.
fn sse_frame(event: &AgentEvent) -> Option<Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Bytes::from(format!("data: {json}\n\n"))),
        Err(e) => {
            log::error!("Failed to serialize agent event: {e}");
            None
        }
    }
}

/// `POST /api/chat`
pub async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> HttpResponse {
    let ChatRequest {
        message,
        conversation_id,
    } = body.into_inner();

    let message = message.trim().to_string();
    if message.is_empty() {
        return HttpResponse::BadRequest().json(ApiError::new("Message must not be empty."));
    }

    let conversation_id = conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    log::info!("Chat turn for conversation {conversation_id}");

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(32);
    let assistant = state.assistant.clone();

    actix_web::rt::spawn(async move {
        let _ = tx
            .send(AgentEvent::ConversationId {
                id: conversation_id.clone(),
            })
            .await;

        match assistant.run_turn(&conversation_id, &message, &tx).await {
            Ok(_) | Err(ServerError::Ai(_)) => {}
            Err(e) => {
                log::error!("Chat turn for {conversation_id} failed: {e}");
                let _ = tx
                    .send(AgentEvent::Error {
                        message: TURN_FAILED_MESSAGE.to_string(),
                    })
                    .await;
            }
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            if let Some(frame) = sse_frame(&event) {
                yield Ok::<_, actix_web::Error>(frame);
            }
        }
    };

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};
    use serde_json::{Value, json};

    use super::*;
    use crate::test_support::{test_state, text_reply, tool_reply};

    fn events(body: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(body)
            .split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(|json| serde_json::from_str(json).unwrap())
            .collect()
    }

    #[actix_web::test]
    async fn streams_conversation_id_then_answer() {
        let t = test_state(vec![
            tool_reply("update_crime_report", json!({ "weapon": "knife" })),
            text_reply("Was anyone hurt?"),
        ])
        .await;
        let app = test::init_service(App::new().app_data(t.state.clone()).configure(crate::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({ "message": "He had a knife" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        let events = events(&body);

        assert_eq!(events[0]["type"], "conversationId");
        let conversation_id = events[0]["id"].as_str().unwrap().to_string();
        assert!(events.iter().any(|e| e["type"] == "reportUpdated"));
        assert_eq!(events.last().unwrap()["type"], "answer");
        assert_eq!(events.last().unwrap()["text"], "Was anyone hurt?");

        let linked = t
            .state
            .sessions
            .record_for_conversation(&conversation_id)
            .await
            .unwrap();
        assert!(linked.is_some());
    }

    #[actix_web::test]
    async fn rejects_empty_message() {
        let t = test_state(vec![]).await;
        let app = test::init_service(App::new().app_data(t.state.clone()).configure(crate::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({ "message": "   " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn provider_failure_ends_with_single_error_event() {
        let t = test_state(vec![]).await;
        let app = test::init_service(App::new().app_data(t.state.clone()).configure(crate::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({ "message": "Hello", "conversationId": "fixed-id" }))
            .to_request();
        let body = test::read_body(test::call_service(&app, req).await).await;
        let events = events(&body);

        assert_eq!(events[0]["id"], "fixed-id");
        let errors: Vec<_> = events.iter().filter(|e| e["type"] == "error").collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["message"], TURN_FAILED_MESSAGE);
    }
}
