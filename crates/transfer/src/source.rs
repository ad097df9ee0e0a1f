use std::future::Future;
use std::pin::Pin;

use rommend_protocol::TransferRequest;
use tokio::io::AsyncRead;

use crate::SourceError;

/// Byte stream of an opened payload.
pub type PayloadBody = Box<dyn AsyncRead + Send + Unpin>;

/// A payload ready to be streamed.
pub struct OpenedPayload {
    /// Length announced by the server, captured once when the payload opens.
    pub total_len: Option<u64>,
    pub body: PayloadBody,
}

impl OpenedPayload {
    pub fn new(total_len: Option<u64>, body: PayloadBody) -> Self {
        Self { total_len, body }
    }
}

/// Where payload bytes come from.
///
/// The catalog client implements this over HTTP; tests implement it with
/// scripted in-memory readers. Every call to [`open`](Self::open) starts a
/// fresh read from byte 0.
pub trait PayloadSource: Send + Sync {
    fn open<'a>(
        &'a self,
        request: &'a TransferRequest,
    ) -> Pin<Box<dyn Future<Output = Result<OpenedPayload, SourceError>> + Send + 'a>>;
}
