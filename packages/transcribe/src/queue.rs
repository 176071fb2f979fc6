//! Background transcription queue.
//!
//! Jobs are pushed onto an unbounded channel and processed one at a time
//! by a spawned worker. Only the download-and-transcribe step is retried,
//! under the [`RetryPolicy`]. The handler has side effects (an agent turn,
//! history, the stored report) and runs at most once per job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{TranscribeError, Transcriber, TranscriptionHandler, TranscriptionJob};

/// How often and how far apart a failed job is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Handle to the transcription worker.
#[derive(Clone)]
pub struct TranscriptionQueue {
    tx: mpsc::UnboundedSender<TranscriptionJob>,
}

impl TranscriptionQueue {
    /// Spawns the worker on the current tokio runtime.
    #[must_use]
    pub fn start(
        transcriber: Arc<dyn Transcriber>,
        handler: Arc<dyn TranscriptionHandler>,
        policy: RetryPolicy,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<TranscriptionJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match process(transcriber.as_ref(), handler.as_ref(), &job, policy).await {
                    Ok(()) => log::info!("Transcription job for call {} complete", job.call_sid),
                    Err(e) => log::error!("Transcription job for call {} failed: {e}", job.call_sid),
                }
            }
            log::debug!("Transcription queue closed");
        });

        Self { tx }
    }

    /// Queues a job without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`TranscribeError::QueueClosed`] if the worker has stopped.
    pub fn enqueue(&self, job: TranscriptionJob) -> Result<(), TranscribeError> {
        log::debug!("Queueing transcription for call {}", job.call_sid);
        self.tx.send(job).map_err(|_| TranscribeError::QueueClosed)
    }
}

async fn process(
    transcriber: &dyn Transcriber,
    handler: &dyn TranscriptionHandler,
    job: &TranscriptionJob,
    policy: RetryPolicy,
) -> Result<(), TranscribeError> {
    let text = transcribe_with_retry(transcriber, job, policy).await?;
    handler.handle(job, &text).await
}

async fn transcribe_with_retry(
    transcriber: &dyn Transcriber,
    job: &TranscriptionJob,
    policy: RetryPolicy,
) -> Result<String, TranscribeError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match transcriber.transcribe(&job.recording_url).await {
            Ok(text) => return Ok(text),
            Err(e) if attempt < attempts => {
                log::warn!(
                    "Transcription attempt {attempt}/{attempts} for call {} failed: {e}",
                    job.call_sid
                );
                attempt += 1;
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;

    struct FlakyTranscriber {
        failures: Mutex<u32>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Transcriber for FlakyTranscriber {
        async fn transcribe(&self, recording_url: &str) -> Result<String, TranscribeError> {
            *self.calls.lock().unwrap() += 1;
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TranscribeError::Api {
                    service: "Whisper",
                    status: 503,
                    message: "busy".to_string(),
                });
            }
            Ok(format!("text of {recording_url}"))
        }
    }

    struct Collect {
        seen: Mutex<Vec<(TranscriptionJob, String)>>,
        done: Mutex<Option<oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl TranscriptionHandler for Collect {
        async fn handle(&self, job: &TranscriptionJob, transcript: &str) -> Result<(), TranscribeError> {
            self.seen
                .lock()
                .unwrap()
                .push((job.clone(), transcript.to_string()));
            if let Some(done) = self.done.lock().unwrap().take() {
                let _ = done.send(());
            }
            Ok(())
        }
    }

    fn job() -> TranscriptionJob {
        TranscriptionJob {
            recording_url: "https://host/RE1".to_string(),
            call_sid: "CA1".to_string(),
        }
    }

    const NO_WAIT: RetryPolicy = RetryPolicy {
        attempts: 5,
        backoff: Duration::ZERO,
    };

    #[test]
    fn default_policy_is_five_attempts_two_seconds_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.backoff, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn retries_until_transcription_succeeds() {
        let transcriber = FlakyTranscriber {
            failures: Mutex::new(2),
            calls: Mutex::new(0),
        };
        let handler = Collect {
            seen: Mutex::new(Vec::new()),
            done: Mutex::new(None),
        };

        process(&transcriber, &handler, &job(), NO_WAIT).await.unwrap();

        assert_eq!(*transcriber.calls.lock().unwrap(), 3);
        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "text of https://host/RE1");
    }

    #[tokio::test]
    async fn gives_up_after_last_attempt() {
        let transcriber = FlakyTranscriber {
            failures: Mutex::new(10),
            calls: Mutex::new(0),
        };
        let handler = Collect {
            seen: Mutex::new(Vec::new()),
            done: Mutex::new(None),
        };

        let result = process(&transcriber, &handler, &job(), NO_WAIT).await;

        assert!(matches!(result, Err(TranscribeError::Api { status: 503, .. })));
        assert_eq!(*transcriber.calls.lock().unwrap(), 5);
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    struct FailingHandler {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl TranscriptionHandler for FailingHandler {
        async fn handle(&self, _job: &TranscriptionJob, _transcript: &str) -> Result<(), TranscribeError> {
            *self.calls.lock().unwrap() += 1;
            Err(TranscribeError::Handler {
                message: "agent failed after saving".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn handler_failure_is_not_retried() {
        let transcriber = FlakyTranscriber {
            failures: Mutex::new(1),
            calls: Mutex::new(0),
        };
        let handler = FailingHandler {
            calls: Mutex::new(0),
        };

        let result = process(&transcriber, &handler, &job(), NO_WAIT).await;

        assert!(matches!(result, Err(TranscribeError::Handler { .. })));
        assert_eq!(*transcriber.calls.lock().unwrap(), 2);
        assert_eq!(*handler.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn worker_processes_enqueued_jobs() {
        let (done_tx, done_rx) = oneshot::channel();
        let handler = Arc::new(Collect {
            seen: Mutex::new(Vec::new()),
            done: Mutex::new(Some(done_tx)),
        });
        let queue = TranscriptionQueue::start(
            Arc::new(FlakyTranscriber {
                failures: Mutex::new(0),
                calls: Mutex::new(0),
            }),
            handler.clone(),
            NO_WAIT,
        );

        queue.enqueue(job()).unwrap();
        done_rx.await.unwrap();

        assert_eq!(handler.seen.lock().unwrap()[0].0, job());
    }
}
