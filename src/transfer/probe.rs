//! Range prober: local inspection of the sink before each attempt.
//!
//! The prober never touches the network. It measures how many bytes the sink
//! already holds, decides the offset the next request should start at, and
//! opens the sink for writing in the matching mode (append when continuing,
//! truncate when starting over).

use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter, Stdout};
use tracing::{debug, instrument};

use super::error::TransferError;
use super::sink::Sink;

/// Where the next attempt starts, derived from the sink's current length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeState {
    /// Size of the sink before this run (or attempt) touched it.
    pub existing_bytes: u64,
    /// Byte offset to request from; 0 when not resuming.
    pub requested_offset: u64,
}

impl ResumeState {
    /// State for a transfer that starts at byte 0.
    #[must_use]
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Whether the next request carries a byte range.
    #[must_use]
    pub fn is_resuming(&self) -> bool {
        self.requested_offset > 0
    }
}

/// Computes the resume state for `sink`.
///
/// - resume requested, sink exists: offset = current length.
/// - resume requested, sink missing: offset 0, no error.
/// - resume not requested: an existing file is truncated now and the offset is 0.
/// - stream sinks always start at 0.
///
/// # Errors
///
/// Returns [`TransferError::Io`] when the sink cannot be inspected or truncated.
#[instrument(level = "debug", fields(sink = %sink))]
pub async fn probe_resume_state(sink: &Sink, resume: bool) -> Result<ResumeState, TransferError> {
    let Sink::File(path) = sink else {
        return Ok(ResumeState::fresh());
    };

    let existing_bytes = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(TransferError::io(path.clone(), e)),
    };

    if resume {
        debug!(existing_bytes, "resuming from current sink length");
        return Ok(ResumeState {
            existing_bytes,
            requested_offset: existing_bytes,
        });
    }

    File::create(path)
        .await
        .map_err(|e| TransferError::io(path.clone(), e))?;
    debug!(existing_bytes, "sink truncated for a fresh transfer");
    Ok(ResumeState {
        existing_bytes,
        requested_offset: 0,
    })
}

/// Opens `sink` for an attempt that writes from byte `offset`.
///
/// A non-zero offset opens the file in append mode; zero truncates it.
///
/// # Errors
///
/// Returns [`TransferError::Io`] when the file cannot be opened.
pub async fn open_sink(sink: &Sink, offset: u64) -> Result<SinkWriter, TransferError> {
    let target = match sink {
        Sink::File(path) => {
            let file = if offset > 0 {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| TransferError::io(path.clone(), e))?
            } else {
                File::create(path)
                    .await
                    .map_err(|e| TransferError::io(path.clone(), e))?
            };
            SinkTarget::File(BufWriter::new(file))
        }
        Sink::Stdout => SinkTarget::Stdout(BufWriter::new(tokio::io::stdout())),
    };

    Ok(SinkWriter {
        target,
        path: sink.display_path(),
        start_offset: offset,
        written: 0,
    })
}

#[derive(Debug)]
enum SinkTarget {
    File(BufWriter<File>),
    Stdout(BufWriter<Stdout>),
}

/// Exclusive write handle on the sink for the duration of one attempt.
#[derive(Debug)]
pub struct SinkWriter {
    target: SinkTarget,
    path: PathBuf,
    start_offset: u64,
    written: u64,
}

impl SinkWriter {
    /// Offset in the sink where this attempt's first byte lands.
    #[must_use]
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Bytes accepted by this writer so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Appends one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Io`] on write failure.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransferError> {
        let result = match &mut self.target {
            SinkTarget::File(writer) => writer.write_all(chunk).await,
            SinkTarget::Stdout(writer) => writer.write_all(chunk).await,
        };
        result.map_err(|e| TransferError::io(self.path.clone(), e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes buffered bytes so they survive a later failure.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Io`] on flush failure.
    pub async fn flush(&mut self) -> Result<(), TransferError> {
        let result = match &mut self.target {
            SinkTarget::File(writer) => writer.flush().await,
            SinkTarget::Stdout(writer) => writer.flush().await,
        };
        result.map_err(|e| TransferError::io(self.path.clone(), e))
    }
}
