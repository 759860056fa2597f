//! Artifact reader implementations

use async_trait::async_trait;
use bytes::Bytes;
use std::io::Cursor;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

use super::error::StorageError;
use super::traits::ArtifactReader;

/// Reader over bytes already held in memory
pub struct BytesReader {
    inner: Cursor<Bytes>,
    closed: bool,
}

impl BytesReader {
    pub fn new(data: Bytes) -> Self {
        Self {
            inner: Cursor::new(data),
            closed: false,
        }
    }
}

impl AsyncRead for BytesReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.closed {
            return Poll::Ready(Err(closed_read_error()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

#[async_trait]
impl ArtifactReader for BytesReader {
    async fn close(&mut self) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::AlreadyClosed("artifact stream"));
        }
        self.closed = true;
        Ok(())
    }
}

/// Reader over a blob file on disk
pub struct FileReader {
    file: Option<File>,
}

impl FileReader {
    pub fn new(file: File) -> Self {
        Self { file: Some(file) }
    }
}

impl AsyncRead for FileReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_read(cx, buf),
            None => Poll::Ready(Err(closed_read_error())),
        }
    }
}

#[async_trait]
impl ArtifactReader for FileReader {
    async fn close(&mut self) -> Result<(), StorageError> {
        match self.file.take() {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(StorageError::AlreadyClosed("artifact file")),
        }
    }
}

fn closed_read_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "read from closed artifact stream")
}
