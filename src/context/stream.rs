//! `std::io::Write` over a response `Sender`.

use std::io::{self, Write};

use axum::body::Bytes;

use crate::context::Sender;
use crate::error::Error;

/// Buffered writer returned by `Context::response_stream`.
///
/// Call [`ResponseStream::finish`] when done. Dropping an unfinished stream
/// discards buffered bytes and aborts the response, so the client sees a
/// broken body instead of a short one.
pub struct ResponseStream {
    sender: Option<Box<dyn Sender>>,
    buf: Vec<u8>,
    capacity: usize,
}

impl ResponseStream {
    pub fn new(sender: Box<dyn Sender>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sender: Some(sender),
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Flush what is buffered and complete the body.
    pub fn finish(mut self) -> io::Result<()> {
        self.flush()?;
        if let Some(sender) = self.sender.take() {
            sender.close();
        }
        Ok(())
    }

    fn sender(&mut self) -> io::Result<&mut Box<dyn Sender>> {
        self.sender
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "response stream finished"))
    }
}

impl Write for ResponseStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.capacity {
            self.flush()?;
        }
        if data.len() >= self.capacity {
            self.sender()?
                .write(Bytes::copy_from_slice(data))
                .map_err(into_io)?;
        } else {
            self.buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buf));
        self.buf.reserve(self.capacity);
        self.sender()?.write(chunk).map_err(into_io)
    }
}

fn into_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::other(other),
    }
}
