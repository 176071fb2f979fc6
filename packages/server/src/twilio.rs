//! Twilio voice webhooks.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};
use detective_telephony::ivr::{self, MenuAction};
use detective_telephony::{TWIML_CONTENT_TYPE, VoiceRequest, assistant};
use detective_transcribe::TranscriptionJob;

use crate::{AppState, ServerError};

fn twiml(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(TWIML_CONTENT_TYPE)
        .body(body)
}

fn enqueue(state: &AppState, recording_url: &str, call_sid: &str) -> Result<(), ServerError> {
    let queue = state
        .transcription
        .as_ref()
        .ok_or(ServerError::TranscriptionDisabled)?;
    queue.enqueue(TranscriptionJob {
        recording_url: recording_url.to_string(),
        call_sid: call_sid.to_string(),
    })?;
    Ok(())
}

fn menu_step(state: &AppState, request: &VoiceRequest) -> Result<String, ServerError> {
    let action = ivr::route(request)?;

    if let MenuAction::RecordingFinished {
        recording_url,
        call_sid,
    } = &action
    {
        log::info!("Recording finished for call {call_sid}");
        enqueue(state, recording_url, call_sid)?;
    }

    Ok(ivr::render(
        &action,
        state.brand_name(),
        &state.config.public_base_url,
        state.config.agent_phone_number.as_deref(),
    ))
}

/// `POST /api/twilio/voice`
///
/// Keypad menu: record a statement or talk to an agent.
pub async fn voice(state: web::Data<AppState>, form: web::Form<VoiceRequest>) -> HttpResponse {
    log::debug!(
        "Voice webhook: call {} status {:?} digits {:?}",
        form.call_sid_or_default(),
        form.call_status,
        form.digits
    );

    match menu_step(&state, &form) {
        Ok(body) => twiml(StatusCode::OK, body),
        Err(e) => {
            log::error!("Voice webhook failed: {e}");
            twiml(StatusCode::INTERNAL_SERVER_ERROR, ivr::error_response())
        }
    }
}

/// `POST /api/twilio/voice-assistant`
///
/// Greets the caller and records the first statement.
pub async fn voice_assistant(state: web::Data<AppState>, form: web::Form<VoiceRequest>) -> HttpResponse {
    log::info!("Incoming assistant call {}", form.call_sid_or_default());
    twiml(
        StatusCode::OK,
        assistant::greeting(state.brand_name(), &state.config.public_base_url),
    )
}

/// `POST /api/twilio/voice-assistant/after-record`
///
/// Speaks the reply to the previous statement if it is ready, then
/// records again.
pub async fn after_record(state: web::Data<AppState>, form: web::Form<VoiceRequest>) -> HttpResponse {
    let call_sid = form.call_sid_or_default();

    match state.sessions.take_pending_reply(call_sid).await {
        Ok(reply) => {
            log::debug!("Call {call_sid}: pending reply ready: {}", reply.is_some());
            twiml(
                StatusCode::OK,
                assistant::after_record(reply.as_deref(), &state.config.public_base_url),
            )
        }
        Err(e) => {
            log::error!("Failed to read pending reply for call {call_sid}: {e}");
            twiml(StatusCode::INTERNAL_SERVER_ERROR, assistant::error_response())
        }
    }
}

/// `POST /api/twilio/voice-assistant/recording-callback`
///
/// Queues transcription once the recording file is available.
pub async fn recording_callback(state: web::Data<AppState>, form: web::Form<VoiceRequest>) -> HttpResponse {
    let (Some(recording_url), Some(call_sid)) = (
        form.recording_url.as_deref().filter(|u| !u.is_empty()),
        form.call_sid.as_deref().filter(|s| !s.is_empty()),
    ) else {
        log::warn!("Recording callback without RecordingUrl or CallSid");
        return HttpResponse::BadRequest().finish();
    };

    match enqueue(&state, recording_url, call_sid) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => {
            log::error!("Failed to queue transcription for call {call_sid}: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
