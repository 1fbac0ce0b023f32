//! # Line Reception
//!
//! The receive half of the serial link. A dedicated task waits for bytes,
//! reads one newline-terminated line under a timeout and hands it to the
//! control loop through a bounded channel.
//!
//! After each line, if more unread input is pending than the discard
//! threshold, the producer is assumed to be ahead of us and out of sync: all
//! pending input is dropped and reception restarts at the next line
//! boundary.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::port_trait::PortControl;
use crate::error::TransportError;

/// Event delivered from the receive task to the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A received line without its `\n` terminator
    Line(String),
    /// A line started but did not finish within the read timeout
    ReadTimeout(Duration),
    /// The port stopped delivering data; the link has been closed
    Disconnected(String),
}

/// Result of one line read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line without its `\n` terminator
    Line(String),
    /// Tail of a line whose start was discarded
    Skipped,
    /// End of stream
    Eof,
}

/// Buffered line reader with timeout and resync policy
pub struct LineReader<R> {
    reader: BufReader<R>,
    control: Arc<dyn PortControl>,
    read_timeout: Duration,
    discard_threshold: usize,
    /// Next line is the tail of discarded data
    skip_partial: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(
        inner: R,
        control: Arc<dyn PortControl>,
        read_timeout: Duration,
        discard_threshold: usize,
    ) -> Self {
        Self {
            reader: BufReader::new(inner),
            control,
            read_timeout,
            discard_threshold,
            skip_partial: false,
        }
    }

    /// Wait until input is available
    ///
    /// Returns `false` at end of stream. Waits without a timeout; an idle
    /// link is not an error.
    pub async fn wait_for_data(&mut self) -> io::Result<bool> {
        let available = self.reader.fill_buf().await?;
        Ok(!available.is_empty())
    }

    /// Read one line within the read timeout
    ///
    /// # Errors
    ///
    /// Returns `ReadTimeout` if no terminator arrives in time (the partial
    /// line is dropped) and `ReadFailed` on driver errors.
    pub async fn read_line(&mut self) -> Result<ReadOutcome, TransportError> {
        let mut line = Vec::new();
        let read = timeout(self.read_timeout, self.reader.read_until(b'\n', &mut line)).await;

        match read {
            Err(_) => {
                if !line.is_empty() {
                    self.skip_partial = true;
                }
                Err(TransportError::ReadTimeout(self.read_timeout))
            }
            Ok(Err(e)) => Err(TransportError::ReadFailed(e.to_string())),
            Ok(Ok(0)) => Ok(ReadOutcome::Eof),
            Ok(Ok(_)) if line.last() != Some(&b'\n') => Ok(ReadOutcome::Eof),
            Ok(Ok(_)) if self.skip_partial => {
                self.skip_partial = false;
                trace!("Skipped {} bytes of a partial line", line.len());
                Ok(ReadOutcome::Skipped)
            }
            Ok(Ok(_)) => {
                line.pop();
                Ok(ReadOutcome::Line(String::from_utf8_lossy(&line).into_owned()))
            }
        }
    }

    /// Bytes received but not yet consumed
    pub fn pending(&self) -> usize {
        self.reader.buffer().len() + self.driver_pending()
    }

    fn driver_pending(&self) -> usize {
        match self.control.bytes_to_read() {
            Ok(count) => count as usize,
            Err(e) => {
                debug!("Could not query pending input: {}", e);
                0
            }
        }
    }

    /// Discard all pending input if it exceeds the discard threshold
    ///
    /// Returns the number of bytes dropped, or `None` if nothing was done.
    pub fn resync_if_behind(&mut self) -> Option<usize> {
        let buffered = self.reader.buffer().len();
        let in_driver = self.driver_pending();
        let pending = buffered + in_driver;
        if pending <= self.discard_threshold {
            return None;
        }

        // Dropped data ending on a terminator leaves us on a line boundary
        let on_boundary = in_driver == 0 && self.reader.buffer().last() == Some(&b'\n');
        self.reader.consume(buffered);
        if let Err(e) = self.control.discard_input() {
            warn!("Failed to discard serial input: {}", e);
        }
        self.skip_partial = !on_boundary;

        Some(pending)
    }
}

/// Receive loop run on its own task for as long as the link is open
pub async fn receive_lines<R>(mut reader: LineReader<R>, events: mpsc::Sender<LinkEvent>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match reader.wait_for_data().await {
            Ok(true) => {}
            Ok(false) => {
                let _ = events.send(LinkEvent::Disconnected("end of stream".to_string())).await;
                return;
            }
            Err(e) => {
                let _ = events.send(LinkEvent::Disconnected(e.to_string())).await;
                return;
            }
        }

        let event = match reader.read_line().await {
            Ok(ReadOutcome::Line(line)) => Some(LinkEvent::Line(line)),
            Ok(ReadOutcome::Skipped) => None,
            Ok(ReadOutcome::Eof) => {
                let _ = events.send(LinkEvent::Disconnected("end of stream".to_string())).await;
                return;
            }
            Err(TransportError::ReadTimeout(limit)) => Some(LinkEvent::ReadTimeout(limit)),
            Err(e) => {
                let _ = events.send(LinkEvent::Disconnected(e.to_string())).await;
                return;
            }
        };

        if let Some(event) = event {
            if events.send(event).await.is_err() {
                // Link side closed
                return;
            }
        }

        if let Some(dropped) = reader.resync_if_behind() {
            debug!("Discarded {} pending bytes to resynchronize", dropped);
        }
    }
}
