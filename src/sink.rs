//! In-memory capture of compiler output.
//!
//! An [`OutputSink`] stands in for the stdout/stderr streams handed to the
//! compiler. It only ever appends; the runner reads it back as bytes (for the
//! binary module) or as text (for the golden diff), and resets it between the
//! two compile phases of one fixture.

use std::fmt;
use std::io::{self, Write};

/// Append-only, chunked byte buffer with optional live echo.
///
/// Text written while the echo flag is set is forwarded unchanged to the echo
/// target (stderr unless overridden). Byte writes are captured but never
/// echoed.
pub struct OutputSink {
    chunks: Vec<Vec<u8>>,
    echo: bool,
    echo_target: Box<dyn Write>,
}

impl OutputSink {
    /// A silent sink that echoes to stderr once echo is switched on.
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            echo: false,
            echo_target: Box::new(io::stderr()),
        }
    }

    /// A sink that starts with echo switched on.
    pub fn echoing() -> Self {
        let mut sink = Self::new();
        sink.echo = true;
        sink
    }

    /// Replaces the live stream that echoed text is forwarded to.
    pub fn with_echo_target(mut self, target: Box<dyn Write>) -> Self {
        self.echo_target = target;
        self
    }

    pub fn is_echoing(&self) -> bool {
        self.echo
    }

    /// Appends a text chunk, echoing it if the echo flag is set.
    pub fn write_str(&mut self, text: &str) {
        self.chunks.push(text.as_bytes().to_vec());
        if self.echo {
            // Echo is best effort; a closed terminal must not lose captured output.
            let _ = self.echo_target.write_all(text.as_bytes());
            let _ = self.echo_target.flush();
        }
    }

    /// Appends a raw byte chunk.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.chunks.push(bytes.to_vec());
    }

    /// All chunks concatenated in write order.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// The concatenated bytes decoded as UTF-8. Invalid sequences become U+FFFD.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }

    /// Total number of captured bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all captured content and switches echo off.
    ///
    /// The chunk list keeps its allocation so the next phase can reuse it.
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.echo = false;
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("chunks", &self.chunks.len())
            .field("bytes", &self.len())
            .field("echo", &self.echo)
            .finish()
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
