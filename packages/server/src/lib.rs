#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web server for conversational crime tip intake.
//!
//! Serves the chat endpoint (SSE streaming from `/api/chat`), report
//! lookup and summary export, location verification, translation,
//! evidence upload and the Twilio voice webhooks. Session state lives in
//! `data/sessions.db`; uploaded evidence is served from `/uploads`.

mod assistant;
mod chat;
mod handlers;
mod phone;
mod twilio;

pub use assistant::Assistant;
pub use phone::PhoneTurnHandler;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use detective_geocoder::Geocoder;
use detective_intake::{AgencyConfig, ReportService};
use detective_sessions::SessionStore;
use detective_transcribe::queue::{RetryPolicy, TranscriptionQueue};
use detective_transcribe::whisper::WhisperClient;
use detective_translate::Translator;
use thiserror::Error;

/// Largest accepted evidence upload, summed over all files of a request.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// How often expired session state is purged.
pub const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Errors from server startup and request handling.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session storage failed.
    #[error("Session error: {0}")]
    Sessions(#[from] detective_sessions::SessionError),

    /// The LLM provider failed or is misconfigured.
    #[error("AI error: {0}")]
    Ai(#[from] detective_ai::AiError),

    /// The report pipeline failed.
    #[error("Intake error: {0}")]
    Intake(#[from] detective_intake::IntakeError),

    /// The report backend is misconfigured.
    #[error("Storage error: {0}")]
    Storage(#[from] detective_storage::StorageError),

    /// The geocoder is misconfigured.
    #[error("Geocoder error: {0}")]
    Geocode(#[from] detective_geocoder::GeocodeError),

    /// Transcription could not be queued.
    #[error("Transcription error: {0}")]
    Transcribe(#[from] detective_transcribe::TranscribeError),

    /// A recording arrived but speech-to-text is not configured.
    #[error("Speech-to-text is not configured")]
    TranscriptionDisabled,

    /// A call webhook carried inconsistent fields.
    #[error("Telephony error: {0}")]
    Telephony(#[from] detective_telephony::TelephonyError),
}

/// Server settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
    /// Externally visible origin, used for upload URLs and `TwiML`
    /// callbacks.
    pub public_base_url: String,
    /// Directory uploaded evidence is written to.
    pub uploads_dir: PathBuf,
    /// Number callers are connected to from the keypad menu.
    pub agent_phone_number: Option<String>,
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT`, `PUBLIC_BASE_URL`, `UPLOADS_DIR` and
    /// `AGENT_PHONE_NUMBER`.
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("http://{bind_addr}:{port}"));
        let uploads_dir = std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "data/uploads".to_string());
        let agent_phone_number = std::env::var("AGENT_PHONE_NUMBER")
            .ok()
            .filter(|n| !n.is_empty());

        Self {
            bind_addr,
            port,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            uploads_dir: PathBuf::from(uploads_dir),
            agent_phone_number,
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Runs chat turns against the report tools.
    pub assistant: Arc<Assistant>,
    /// Report pipeline.
    pub reports: Arc<ReportService>,
    /// Session associations and history.
    pub sessions: SessionStore,
    /// Translation for the `/api/translate` endpoint.
    pub translator: Arc<dyn Translator>,
    /// Location verification for the `/api/geocode` endpoint.
    pub geocoder: Arc<dyn Geocoder>,
    /// Background transcription of call recordings; `None` when
    /// speech-to-text is not configured.
    pub transcription: Option<TranscriptionQueue>,
    /// Server settings.
    pub config: ServerConfig,
}

impl AppState {
    /// Brand name spoken and shown to reporters.
    #[must_use]
    pub fn brand_name(&self) -> &str {
        &self.reports.agency().brand_name
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/chat", web::post().to(chat::chat))
            .route("/reports/{conversation_id}", web::get().to(handlers::report))
            .route(
                "/reports/{conversation_id}/summary",
                web::get().to(handlers::report_summary),
            )
            .route("/geocode", web::get().to(handlers::geocode))
            .route("/translate", web::post().to(handlers::translate))
            .route("/evidence", web::post().to(handlers::upload_evidence))
            .route("/twilio/voice", web::post().to(twilio::voice))
            .route("/twilio/voice-assistant", web::post().to(twilio::voice_assistant))
            .route(
                "/twilio/voice-assistant/after-record",
                web::post().to(twilio::after_record),
            )
            .route(
                "/twilio/voice-assistant/recording-callback",
                web::post().to(twilio::recording_callback),
            ),
    );
}

/// Builds the application state from the environment.
///
/// # Errors
///
/// Returns [`ServerError`] if a required adapter is misconfigured or the
/// session database cannot be opened.
pub async fn build_state(config: ServerConfig) -> Result<AppState, ServerError> {
    let client = reqwest::Client::new();

    let agency = AgencyConfig::from_env();
    log::info!("Serving {} ({})", agency.brand_name, agency.fallback_city);

    let store = Arc::from(detective_storage::from_env(client.clone())?);
    let geocoder: Arc<dyn Geocoder> = Arc::from(detective_geocoder::from_env(client.clone())?);
    let translator: Arc<dyn Translator> = Arc::from(detective_translate::from_env(client.clone()));
    let weather = detective_weather::from_env(client.clone()).map(Arc::from);
    let provider = Arc::from(detective_ai::providers::create_provider_from_env(client.clone())?);

    let reports = Arc::new(ReportService::new(
        store,
        geocoder.clone(),
        translator.clone(),
        weather,
        agency,
    ));

    log::info!("Opening session store...");
    let sessions = SessionStore::from_env().await?;

    let assistant = Arc::new(Assistant::new(reports.clone(), sessions.clone(), provider));

    let transcription = match WhisperClient::from_env(client) {
        Ok(whisper) => {
            let handler = PhoneTurnHandler::new(assistant.clone(), sessions.clone(), translator.clone());
            Some(TranscriptionQueue::start(
                Arc::new(whisper),
                Arc::new(handler),
                RetryPolicy::default(),
            ))
        }
        Err(e) => {
            log::warn!("Call recordings will not be transcribed: {e}");
            None
        }
    };

    Ok(AppState {
        assistant,
        reports,
        sessions,
        translator,
        geocoder,
        transcription,
        config,
    })
}

/// Purges expired associations and idle conversations every `every`,
/// starting immediately, for as long as the runtime lives.
pub fn spawn_session_purge(sessions: SessionStore, every: Duration) {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match sessions.purge().await {
                Ok(summary) => log::debug!(
                    "Session purge removed {} value(s) and {} conversation(s)",
                    summary.values,
                    summary.conversations
                ),
                Err(e) => log::warn!("Session purge failed: {e}"),
            }
        }
    });
}

/// Starts the intake API server.
///
/// This is a regular async function; the caller provides the async
/// runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if startup fails or the HTTP server fails to
/// bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), ServerError> {
    let config = ServerConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let port = config.port;
    let uploads_dir = config.uploads_dir.clone();

    tokio::fs::create_dir_all(&uploads_dir).await?;

    let state = web::Data::new(build_state(config).await?);
    spawn_session_purge(state.sessions.clone(), SESSION_PURGE_INTERVAL);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
            // Serve uploaded evidence
            .service(Files::new("/uploads", uploads_dir.clone()))
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::Mutex;

    use actix_web::web;
    use async_trait::async_trait;
    use chrono::Duration;
    use detective_ai::AiError;
    use detective_ai::providers::{ContentBlock, LlmProvider, LlmResponse, Message, StopReason};
    use detective_geocoder::{GeocodeError, Geocoder, LocationCandidate};
    use detective_intake::{AgencyConfig, ReportService};
    use detective_sessions::SessionStore;
    use detective_storage::memory::MemoryStore;
    use detective_translate::{TranslateError, Translator};
    use serde_json::Value;

    use crate::{AppState, Assistant, ServerConfig};

    /// Replays canned responses and records the user texts it saw.
    pub struct ScriptedProvider {
        pub replies: Mutex<Vec<LlmResponse>>,
        pub seen: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<LlmResponse>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    pub fn text_reply(text: &str) -> LlmResponse {
        LlmResponse {
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
        }
    }

    pub fn tool_reply(name: &str, input: Value) -> LlmResponse {
        LlmResponse {
            content: vec![ContentBlock::ToolUse {
                id: format!("call_{name}"),
                name: name.to_string(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(
            &self,
            _system_prompt: &str,
            messages: &[Message],
            _tools: &[Value],
        ) -> Result<LlmResponse, AiError> {
            if let Some(last) = messages.last() {
                self.seen.lock().unwrap().push(last.text());
            }
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(AiError::Provider {
                    message: "no scripted reply".to_string(),
                });
            }
            Ok(replies.remove(0))
        }
    }

    pub struct OnePlace;

    #[async_trait]
    impl Geocoder for OnePlace {
        fn name(&self) -> &'static str {
            "one-place"
        }

        async fn search(&self, _address: &str) -> Result<Vec<LocationCandidate>, GeocodeError> {
            Ok(vec![LocationCandidate {
                formatted_address: "100 Main Plaza, San Antonio, TX 78205, USA".to_string(),
                lat: 29.424,
                lng: -98.494,
            }])
        }
    }

    /// Spanish when the text contains "robo"; translations are tagged
    /// with the target language.
    pub struct TaggingTranslator;

    #[async_trait]
    impl Translator for TaggingTranslator {
        async fn translate(&self, text: &str, target: &str) -> Result<String, TranslateError> {
            Ok(format!("[{target}] {text}"))
        }

        async fn detect(&self, text: &str) -> Result<String, TranslateError> {
            Ok(if text.contains("robo") { "es" } else { "en" }.to_string())
        }
    }

    pub struct TestState {
        pub state: web::Data<AppState>,
        pub store: Arc<MemoryStore>,
        pub provider: Arc<ScriptedProvider>,
        pub db_path: PathBuf,
        pub uploads_dir: PathBuf,
    }

    impl Drop for TestState {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.db_path);
            let _ = std::fs::remove_dir_all(&self.uploads_dir);
        }
    }

    pub async fn test_state(replies: Vec<LlmResponse>) -> TestState {
        let id = uuid::Uuid::new_v4();
        let db_path = std::env::temp_dir().join(format!("detective-server-{id}.db"));
        let uploads_dir = std::env::temp_dir().join(format!("detective-uploads-{id}"));

        let store = Arc::new(MemoryStore::default());
        let provider = Arc::new(ScriptedProvider::new(replies));
        let geocoder: Arc<dyn Geocoder> = Arc::new(OnePlace);
        let translator: Arc<dyn Translator> = Arc::new(TaggingTranslator);

        let reports = Arc::new(ReportService::new(
            store.clone(),
            geocoder.clone(),
            translator.clone(),
            None,
            AgencyConfig::embedded(),
        ));
        let db = detective_sessions::open_db(&db_path).await.unwrap();
        let sessions = SessionStore::new(Arc::from(db), Duration::hours(1));
        let assistant = Arc::new(Assistant::new(
            reports.clone(),
            sessions.clone(),
            provider.clone(),
        ));

        TestState {
            state: web::Data::new(AppState {
                assistant,
                reports,
                sessions,
                translator,
                geocoder,
                transcription: None,
                config: ServerConfig {
                    bind_addr: "127.0.0.1".to_string(),
                    port: 8080,
                    public_base_url: "http://tips.test".to_string(),
                    uploads_dir: uploads_dir.clone(),
                    agent_phone_number: Some("+12105550100".to_string()),
                },
            }),
            store,
            provider,
            db_path,
            uploads_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use detective_sessions::kv;

    use super::*;
    use crate::test_support::test_state;

    #[actix_web::test]
    async fn background_purge_removes_expired_values() {
        let t = test_state(vec![]).await;
        let db = t.state.sessions.db();
        kv::set(db, "reply:CA-old", "stale", Utc::now() - chrono::Duration::minutes(5))
            .await
            .unwrap();
        kv::set(db, "reply:CA-new", "fresh", Utc::now() + chrono::Duration::minutes(5))
            .await
            .unwrap();

        spawn_session_purge(t.state.sessions.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!kv::delete(db, "reply:CA-old").await.unwrap());
        assert!(kv::delete(db, "reply:CA-new").await.unwrap());
    }
}
