//! Streaming artifacts to clients
//!
//! [`ScopedHandles`] owns the two handles a retrieval holds open: the
//! artifact stream and the storage handle it came from. Both are closed on
//! every exit path: explicitly at the end of a transfer, or from `Drop` when
//! a response body is abandoned mid-stream.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::constants::{TOOLS_CONTENT_TYPE, TRANSFER_CHUNK_SIZE};
use crate::error::ToolsError;
use crate::metrics::Metrics;
use crate::storage::{ArtifactMetadata, ArtifactStream, StorageError, ToolsStorage};

/// Destination of a transfer that is told the length before any byte
#[async_trait]
pub trait ResponseSink: AsyncWrite + Unpin + Send {
    async fn set_length(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl ResponseSink for tokio::fs::File {
    async fn set_length(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await
    }
}

/// Artifact stream plus the storage handle that opened it
pub struct ScopedHandles {
    stream: Option<ArtifactStream>,
    storage: Option<Box<dyn ToolsStorage>>,
}

impl ScopedHandles {
    pub fn for_storage(storage: Box<dyn ToolsStorage>) -> Self {
        Self {
            stream: None,
            storage: Some(storage),
        }
    }

    /// Attach the stream opened through the storage handle
    pub fn attach(&mut self, stream: ArtifactStream) {
        self.stream = Some(stream);
    }

    pub fn storage(&self) -> Option<&dyn ToolsStorage> {
        self.storage.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none() && self.storage.is_none()
    }

    /// Close the stream, then the storage handle.
    ///
    /// Both are closed even if the first close fails. If both fail, the
    /// stream's error is returned with the storage error attached.
    pub async fn close(&mut self) -> Result<(), StorageError> {
        close_pair(self.stream.take(), self.storage.take()).await
    }
}

async fn close_pair(
    stream: Option<ArtifactStream>,
    storage: Option<Box<dyn ToolsStorage>>,
) -> Result<(), StorageError> {
    let first = match stream {
        Some(mut stream) => stream.close().await,
        None => Ok(()),
    };
    let second = match storage {
        Some(storage) => storage.close().await,
        None => Ok(()),
    };
    StorageError::combine(first, second)
}

impl AsyncRead for ScopedHandles {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_read(cx, buf),
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no artifact stream attached",
            ))),
        }
    }
}

impl Drop for ScopedHandles {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        let stream = self.stream.take();
        let storage = self.storage.take();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = close_pair(stream, storage).await {
                        tracing::warn!(error = %e, "Failed to release abandoned storage handles");
                    }
                });
            }
            Err(_) => {
                tracing::warn!("Storage handles dropped outside a runtime and not closed");
            }
        }
    }
}

/// Copy an artifact into `sink`, then release both handles.
///
/// The sink's length is set to `metadata.size` before the first byte.
/// Returns the number of bytes copied.
pub async fn send<S: ResponseSink>(
    sink: &mut S,
    metadata: &ArtifactMetadata,
    mut handles: ScopedHandles,
) -> Result<u64, ToolsError> {
    let copied = copy_to_sink(sink, metadata, &mut handles).await;
    let closed = handles.close().await;

    match (copied, closed) {
        (Ok(n), Ok(())) => Ok(n),
        (Ok(_), Err(e)) => Err(ToolsError::StorageFailure(e)),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::warn!(error = %close_err, "Failed to release storage handles after failed transfer");
            Err(e.with_close_failure(close_err))
        }
    }
}

async fn copy_to_sink<S: ResponseSink>(
    sink: &mut S,
    metadata: &ArtifactMetadata,
    handles: &mut ScopedHandles,
) -> Result<u64, ToolsError> {
    let send_error = |e: io::Error| ToolsError::Transport(format!("failed to send agent binaries: {}", e));

    tracing::trace!(size = metadata.size, "Sending agent binaries");
    sink.set_length(metadata.size).await.map_err(send_error)?;
    let copied = tokio::io::copy(handles, sink).await.map_err(send_error)?;
    sink.flush().await.map_err(send_error)?;

    if copied != metadata.size {
        return Err(ToolsError::StorageFailure(StorageError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "stored agent binaries {} are {} bytes, expected {}",
                metadata.version, copied, metadata.size
            ),
        ))));
    }
    Ok(copied)
}

struct BodyState {
    handles: ScopedHandles,
    metrics: Arc<Metrics>,
}

/// HTTP response streaming the artifact.
///
/// The handles are closed when the stream ends or fails; if the client goes
/// away first, dropping the body closes them.
pub fn into_response(
    metadata: &ArtifactMetadata,
    handles: ScopedHandles,
    metrics: Arc<Metrics>,
) -> Response {
    let state = BodyState { handles, metrics };

    let stream = futures::stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        let mut buf = BytesMut::zeroed(TRANSFER_CHUNK_SIZE);
        match state.handles.read(&mut buf).await {
            Ok(0) => {
                if let Err(e) = state.handles.close().await {
                    state.metrics.increment_close_failures();
                    tracing::warn!(error = %e, "Failed to release storage handles");
                }
                None
            }
            Ok(n) => {
                buf.truncate(n);
                state.metrics.add_bytes_sent(n as u64);
                let chunk: Bytes = buf.freeze();
                Some((Ok::<Bytes, io::Error>(chunk), Some(state)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed reading stored agent binaries");
                if let Err(close_err) = state.handles.close().await {
                    state.metrics.increment_close_failures();
                    tracing::warn!(error = %close_err, "Failed to release storage handles");
                }
                Some((Err(e), None))
            }
        }
    });

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(TOOLS_CONTENT_TYPE)),
            (header::CONTENT_LENGTH, HeaderValue::from(metadata.size)),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
