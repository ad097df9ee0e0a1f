use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rommend_protocol::{ProgressSink, TransferRequest};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::progress::ProgressMeter;
use crate::source::{OpenedPayload, PayloadBody, PayloadSource};
use crate::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE, SourceError, TransferError};

/// Terminal result of one transfer. Produced exactly once per request.
#[derive(Debug)]
pub enum TransferOutcome {
    Completed(PathBuf),
    Failed(TransferError),
    Cancelled,
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// One human-readable status line per terminal state.
    pub fn status_message(&self) -> String {
        match self {
            Self::Completed(path) => format!("Download complete: {}", path.display()),
            Self::Failed(err) => format!("Download failed: {err}"),
            Self::Cancelled => "Download cancelled".to_string(),
        }
    }
}

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before giving up.
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Early exit from a running transfer.
enum Interrupted {
    Cancelled,
    Failed(TransferError),
}

impl From<TransferError> for Interrupted {
    fn from(err: TransferError) -> Self {
        Self::Failed(err)
    }
}

impl From<io::Error> for Interrupted {
    fn from(err: io::Error) -> Self {
        Self::Failed(TransferError::Io(err))
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), Interrupted> {
    if cancel.is_cancelled() {
        Err(Interrupted::Cancelled)
    } else {
        Ok(())
    }
}

/// Streams remote payloads to local files.
///
/// The engine holds no per-transfer state, so one instance can serve any
/// number of sequential requests.
pub struct TransferEngine {
    source: Arc<dyn PayloadSource>,
    chunk_size: usize,
    retry: RetryPolicy,
    read_timeout: Option<Duration>,
}

impl TransferEngine {
    pub fn new(source: Arc<dyn PayloadSource>) -> Self {
        Self {
            source,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            read_timeout: None,
        }
    }

    /// Sets the chunk size, raised to [`MIN_CHUNK_SIZE`] if smaller.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Deadline for each individual read; a timeout counts as a read failure.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Streams `request` into its destination file.
    ///
    /// Emits one progress snapshot per written chunk. On cancellation the
    /// file is flushed and left in place with exactly the bytes written.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> TransferOutcome {
        info!(
            item = request.remote_id,
            name = %request.display_name,
            dest = %request.destination.display(),
            "transfer started"
        );

        match self.run(request, sink, cancel).await {
            Ok(transferred) => {
                info!(item = request.remote_id, bytes = transferred, "transfer completed");
                TransferOutcome::Completed(request.destination.clone())
            }
            Err(Interrupted::Cancelled) => {
                info!(item = request.remote_id, "transfer cancelled");
                TransferOutcome::Cancelled
            }
            Err(Interrupted::Failed(err)) => {
                warn!(item = request.remote_id, error = %err, "transfer failed");
                TransferOutcome::Failed(err)
            }
        }
    }

    async fn run(
        &self,
        request: &TransferRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, Interrupted> {
        check_cancelled(cancel)?;

        let OpenedPayload {
            total_len,
            mut body,
        } = self.open(request, cancel).await?;

        if let (Some(hint), Some(total)) = (request.size_hint, total_len) {
            if hint != total {
                debug!(item = request.remote_id, hint, total, "server length differs from listing");
            }
        }

        if let Some(parent) = request.destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = File::create(&request.destination).await?;
        let meter = ProgressMeter::start(total_len);
        let streamed = self.stream(&mut body, &mut file, &meter, sink, cancel).await;

        // Flush on every exit so a cancelled file holds every byte written.
        let flushed = file.flush().await;
        drop(file);
        let transferred = streamed?;
        flushed?;

        if let Some(expected) = total_len {
            if transferred < expected {
                return Err(TransferError::Truncated {
                    received: transferred,
                    expected,
                }
                .into());
            }
        }
        Ok(transferred)
    }

    /// Opens the payload, retrying connection errors. HTTP status errors
    /// are final.
    async fn open(
        &self,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> Result<OpenedPayload, Interrupted> {
        let mut attempt = 0;
        loop {
            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupted::Cancelled),
                opened = self.source.open(request) => opened,
            };

            match opened {
                Ok(payload) => {
                    debug!(item = request.remote_id, total = ?payload.total_len, "payload opened");
                    return Ok(payload);
                }
                Err(SourceError::Status(code)) => {
                    return Err(TransferError::Status(code).into());
                }
                Err(SourceError::Connection(msg)) => {
                    attempt += 1;
                    if attempt > self.retry.max_retries {
                        return Err(TransferError::Network(msg).into());
                    }
                    warn!(
                        item = request.remote_id,
                        attempt,
                        max = self.retry.max_retries,
                        error = %msg,
                        "open failed, retrying"
                    );
                    self.backoff(attempt, cancel).await?;
                }
            }
        }
    }

    async fn stream(
        &self,
        body: &mut PayloadBody,
        file: &mut File,
        meter: &ProgressMeter,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, Interrupted> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut transferred = 0u64;

        loop {
            check_cancelled(cancel)?;

            let filled = self.fill_chunk(body, &mut buf, cancel).await?;
            if filled == 0 {
                break;
            }

            file.write_all(&buf[..filled]).await?;
            transferred += filled as u64;
            sink.transfer_progress(&meter.snapshot(transferred));

            // A short chunk means the stream ended while filling it.
            if filled < buf.len() {
                break;
            }
        }

        Ok(transferred)
    }

    /// Reads until `buf` is full or the stream ends. Failed reads are
    /// retried on the same stream, so bytes already received are kept.
    /// A read still waiting for data is abandoned on cancellation; bytes
    /// of an unwritten partial chunk are dropped.
    async fn fill_chunk(
        &self,
        body: &mut PayloadBody,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize, Interrupted> {
        let mut filled = 0;
        let mut failures = 0u32;

        while filled < buf.len() {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupted::Cancelled),
                read = self.read_once(body, &mut buf[filled..]) => read,
            };
            match read {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    failures = 0;
                }
                Err(err) => {
                    failures += 1;
                    if failures > self.retry.max_retries {
                        return Err(TransferError::RetriesExhausted {
                            retries: self.retry.max_retries,
                            source: err,
                        }
                        .into());
                    }
                    warn!(
                        attempt = failures,
                        max = self.retry.max_retries,
                        error = %err,
                        "read failed, retrying"
                    );
                    self.backoff(failures, cancel).await?;
                }
            }
        }

        Ok(filled)
    }

    async fn read_once(&self, body: &mut PayloadBody, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_timeout {
            Some(limit) => match tokio::time::timeout(limit, body.read(buf)).await {
                Ok(read) => read,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
            },
            None => body.read(buf).await,
        }
    }

    async fn backoff(&self, attempt: u32, cancel: &CancellationToken) -> Result<(), Interrupted> {
        let delay = self.retry.delay_for(attempt);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rommend_protocol::TransferProgress;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    const KIB: usize = 1024;

    enum Step {
        Data(Vec<u8>),
        Fail(io::ErrorKind),
    }

    struct ScriptedReader {
        steps: VecDeque<Step>,
    }

    impl AsyncRead for ScriptedReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            match this.steps.pop_front() {
                None => Poll::Ready(Ok(())),
                Some(Step::Fail(kind)) => {
                    Poll::Ready(Err(io::Error::new(kind, "scripted failure")))
                }
                Some(Step::Data(mut data)) => {
                    let n = data.len().min(buf.remaining());
                    buf.put_slice(&data[..n]);
                    if n < data.len() {
                        let rest = data.split_off(n);
                        this.steps.push_front(Step::Data(rest));
                    }
                    Poll::Ready(Ok(()))
                }
            }
        }
    }

    type Script = Result<(Option<u64>, Vec<Step>), SourceError>;

    struct ScriptedSource {
        opens: Mutex<VecDeque<Script>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(opens: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                opens: Mutex::new(opens.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn single(total: Option<u64>, steps: Vec<Step>) -> Arc<Self> {
            Self::new(vec![Ok((total, steps))])
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PayloadSource for ScriptedSource {
        fn open<'a>(
            &'a self,
            _request: &'a TransferRequest,
        ) -> Pin<Box<dyn Future<Output = Result<OpenedPayload, SourceError>> + Send + 'a>>
        {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let next = self
                    .opens
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err(SourceError::Connection("script exhausted".into())));
                next.map(|(total, steps)| {
                    let reader = ScriptedReader {
                        steps: steps.into(),
                    };
                    OpenedPayload::new(total, Box::new(reader))
                })
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<TransferProgress>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl RecordingSink {
        fn cancelling_after(events: usize, token: CancellationToken) -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                cancel_after: Some((events, token)),
            }
        }

        fn events(&self) -> Vec<TransferProgress> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressSink for RecordingSink {
        fn report(&self, _percentage: i32, _status: &str) {}

        fn transfer_progress(&self, progress: &TransferProgress) {
            let mut events = self.events.lock().unwrap();
            events.push(progress.clone());
            if let Some((after, token)) = &self.cancel_after {
                if events.len() >= *after {
                    token.cancel();
                }
            }
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn request(dir: &std::path::Path, name: &str) -> TransferRequest {
        TransferRequest {
            remote_id: 42,
            payload_name: name.to_string(),
            display_name: "Test Title".to_string(),
            destination: dir.join(name),
            size_hint: None,
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_step: Duration::from_millis(1),
        }
    }

    fn engine(source: Arc<ScriptedSource>) -> TransferEngine {
        TransferEngine::new(source)
            .with_chunk_size(MIN_CHUNK_SIZE)
            .with_retry_policy(fast_retry(3))
    }

    #[test]
    fn retry_policy_backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
    }

    #[test]
    fn chunk_size_has_floor() {
        let source = ScriptedSource::new(vec![]);
        let engine = TransferEngine::new(source).with_chunk_size(1024);
        assert_eq!(engine.chunk_size(), MIN_CHUNK_SIZE);
    }

    #[test]
    fn status_messages_per_outcome() {
        assert_eq!(TransferOutcome::Cancelled.status_message(), "Download cancelled");
        let failed = TransferOutcome::Failed(TransferError::Status(404));
        assert_eq!(failed.status_message(), "Download failed: server returned HTTP 404");
        assert!(TransferOutcome::Completed(PathBuf::from("a")).is_completed());
    }

    #[tokio::test]
    async fn completes_known_length_payload() {
        let dir = tempfile::tempdir().unwrap();
        let data = payload(200 * KIB);
        let source = ScriptedSource::single(
            Some(data.len() as u64),
            vec![Step::Data(data[..100 * KIB].to_vec()), Step::Data(data[100 * KIB..].to_vec())],
        );
        let sink = RecordingSink::default();
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source).transfer(&req, &sink, &CancellationToken::new()).await;

        assert!(matches!(&outcome, TransferOutcome::Completed(p) if *p == req.destination));
        assert_eq!(std::fs::read(&req.destination).unwrap(), data);

        let events = sink.events();
        // 64 + 64 + 64 + 8 KiB chunks.
        assert_eq!(events.len(), 4);
        let total = data.len() as u64;
        let mut last = -1;
        for event in &events {
            assert_eq!(event.percentage as u64, event.transferred * 100 / total);
            assert!(event.percentage >= last);
            last = event.percentage;
        }
        assert_eq!(events.last().unwrap().percentage, 100);
        assert_eq!(events.last().unwrap().transferred, total);
    }

    #[tokio::test]
    async fn unknown_length_reports_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        let data = payload(10 * KIB);
        let source = ScriptedSource::single(None, vec![Step::Data(data.clone())]);
        let sink = RecordingSink::default();
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source).transfer(&req, &sink, &CancellationToken::new()).await;

        assert!(outcome.is_completed());
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].percentage, -1);
        assert_eq!(events[0].transferred, data.len() as u64);
        assert!(events[0].remaining.is_none());
    }

    #[tokio::test]
    async fn retries_failed_reads_then_completes() {
        let dir = tempfile::tempdir().unwrap();
        let data = payload(100 * KIB);
        let source = ScriptedSource::single(
            Some(data.len() as u64),
            vec![
                Step::Fail(io::ErrorKind::ConnectionReset),
                Step::Fail(io::ErrorKind::ConnectionReset),
                Step::Data(data.clone()),
            ],
        );
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source.clone())
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        assert!(outcome.is_completed(), "{outcome:?}");
        assert_eq!(std::fs::read(&req.destination).unwrap(), data);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn mid_stream_failures_do_not_duplicate_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let data = payload(150 * KIB);
        let source = ScriptedSource::single(
            Some(data.len() as u64),
            vec![
                Step::Data(data[..30 * KIB].to_vec()),
                Step::Fail(io::ErrorKind::TimedOut),
                Step::Data(data[30 * KIB..90 * KIB].to_vec()),
                Step::Fail(io::ErrorKind::ConnectionReset),
                Step::Fail(io::ErrorKind::ConnectionReset),
                Step::Data(data[90 * KIB..].to_vec()),
            ],
        );
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source)
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        assert!(outcome.is_completed(), "{outcome:?}");
        assert_eq!(std::fs::read(&req.destination).unwrap(), data);
    }

    #[tokio::test]
    async fn failure_counter_resets_after_successful_read() {
        let dir = tempfile::tempdir().unwrap();
        let data = payload(4 * KIB);
        let mut steps = Vec::new();
        for piece in data.chunks(KIB) {
            steps.push(Step::Fail(io::ErrorKind::ConnectionReset));
            steps.push(Step::Fail(io::ErrorKind::ConnectionReset));
            steps.push(Step::Data(piece.to_vec()));
        }
        let source = ScriptedSource::single(Some(data.len() as u64), steps);
        let req = request(dir.path(), "game.bin");

        let outcome = TransferEngine::new(source)
            .with_retry_policy(fast_retry(2))
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        assert!(outcome.is_completed(), "{outcome:?}");
        assert_eq!(std::fs::read(&req.destination).unwrap(), data);
    }

    #[tokio::test]
    async fn exhausted_retries_fail() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::single(
            Some(1000),
            vec![
                Step::Fail(io::ErrorKind::ConnectionReset),
                Step::Fail(io::ErrorKind::ConnectionReset),
                Step::Fail(io::ErrorKind::ConnectionReset),
                Step::Fail(io::ErrorKind::ConnectionReset),
                Step::Data(payload(1000)),
            ],
        );
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source)
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        match outcome {
            TransferOutcome::Failed(TransferError::RetriesExhausted { retries, source }) => {
                assert_eq!(retries, 3);
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_after_first_chunk_keeps_written_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let data = payload(256 * KIB);
        let source = ScriptedSource::single(Some(data.len() as u64), vec![Step::Data(data.clone())]);
        let cancel = CancellationToken::new();
        let sink = RecordingSink::cancelling_after(1, cancel.clone());
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source).transfer(&req, &sink, &cancel).await;

        assert!(matches!(outcome, TransferOutcome::Cancelled));
        let written = std::fs::read(&req.destination).unwrap();
        assert_eq!(written.len(), MIN_CHUNK_SIZE);
        assert_eq!(written.as_slice(), &data[..MIN_CHUNK_SIZE]);
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_transfer_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::single(Some(10), vec![Step::Data(payload(10))]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source.clone())
            .transfer(&req, &RecordingSink::default(), &cancel)
            .await;

        assert!(matches!(outcome, TransferOutcome::Cancelled));
        assert!(!req.destination.exists());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn http_status_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::new(vec![
            Err(SourceError::Status(404)),
            Ok((Some(1), vec![Step::Data(vec![1])])),
        ]);
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source.clone())
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        assert!(matches!(outcome, TransferOutcome::Failed(TransferError::Status(404))));
        assert_eq!(source.calls(), 1);
        assert!(!req.destination.exists());
    }

    #[tokio::test]
    async fn connection_errors_on_open_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let data = payload(512);
        let source = ScriptedSource::new(vec![
            Err(SourceError::Connection("refused".into())),
            Err(SourceError::Connection("refused".into())),
            Ok((Some(data.len() as u64), vec![Step::Data(data.clone())])),
        ]);
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source.clone())
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        assert!(outcome.is_completed(), "{outcome:?}");
        assert_eq!(source.calls(), 3);
        assert_eq!(std::fs::read(&req.destination).unwrap(), data);
    }

    #[tokio::test]
    async fn open_gives_up_after_max_retries() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::new(vec![]);
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source.clone())
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        assert!(matches!(outcome, TransferOutcome::Failed(TransferError::Network(_))));
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn early_end_of_announced_length_is_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::single(Some(2000), vec![Step::Data(payload(1500))]);
        let req = request(dir.path(), "game.bin");

        let outcome = engine(source)
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        match outcome {
            TransferOutcome::Failed(TransferError::Truncated { received, expected }) => {
                assert_eq!(received, 1500);
                assert_eq!(expected, 2000);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_reads_time_out() {
        struct StalledSource;

        impl PayloadSource for StalledSource {
            fn open<'a>(
                &'a self,
                _request: &'a TransferRequest,
            ) -> Pin<Box<dyn Future<Output = Result<OpenedPayload, SourceError>> + Send + 'a>>
            {
                Box::pin(async move {
                    // Keep the writer half alive so reads block instead of hitting EOF.
                    let (reader, writer) = tokio::io::duplex(64);
                    std::mem::forget(writer);
                    Ok(OpenedPayload::new(None, Box::new(reader)))
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), "game.bin");

        let outcome = TransferEngine::new(Arc::new(StalledSource))
            .with_retry_policy(fast_retry(1))
            .with_read_timeout(Some(Duration::from_millis(20)))
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        match outcome {
            TransferOutcome::Failed(TransferError::RetriesExhausted { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::TimedOut);
            }
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_interrupts_stalled_read() {
        struct StalledSource;

        impl PayloadSource for StalledSource {
            fn open<'a>(
                &'a self,
                _request: &'a TransferRequest,
            ) -> Pin<Box<dyn Future<Output = Result<OpenedPayload, SourceError>> + Send + 'a>>
            {
                Box::pin(async move {
                    let (reader, writer) = tokio::io::duplex(64);
                    std::mem::forget(writer);
                    Ok(OpenedPayload::new(Some(1000), Box::new(reader)))
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), "game.bin");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = TransferEngine::new(Arc::new(StalledSource))
            .transfer(&req, &RecordingSink::default(), &cancel)
            .await;

        assert!(matches!(outcome, TransferOutcome::Cancelled));
        assert_eq!(std::fs::metadata(&req.destination).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::single(Some(3), vec![Step::Data(vec![1, 2, 3])]);
        let mut req = request(dir.path(), "game.bin");
        req.destination = dir.path().join("snes").join("nested").join("game.bin");

        let outcome = engine(source)
            .transfer(&req, &RecordingSink::default(), &CancellationToken::new())
            .await;

        assert!(outcome.is_completed());
        assert_eq!(std::fs::read(&req.destination).unwrap(), vec![1, 2, 3]);
    }
}
