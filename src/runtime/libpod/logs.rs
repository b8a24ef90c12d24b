// ABOUTME: Splits engine log bodies into lines, demultiplexing stdout/stderr framing.
// ABOUTME: Non-tty containers prefix each payload with an 8-byte header; tty output is raw.

use crate::model::{LogLine, LogStream};

const HEADER_LEN: usize = 8;

/// Incremental decoder fed with body chunks in arrival order.
#[derive(Debug)]
pub(crate) struct LogDecoder {
    multiplexed: bool,
    pending: Vec<u8>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl LogDecoder {
    pub(crate) fn new(multiplexed: bool) -> Self {
        Self {
            multiplexed,
            pending: Vec::new(),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Consume a chunk and return every complete line it finishes.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<LogLine> {
        let mut lines = Vec::new();
        if !self.multiplexed {
            self.stdout.extend_from_slice(chunk);
            drain_lines(&mut self.stdout, LogStream::Stdout, &mut lines);
            return lines;
        }

        self.pending.extend_from_slice(chunk);
        loop {
            if self.pending.len() < HEADER_LEN {
                break;
            }
            let size = u32::from_be_bytes([
                self.pending[4],
                self.pending[5],
                self.pending[6],
                self.pending[7],
            ]) as usize;
            if self.pending.len() < HEADER_LEN + size {
                break;
            }
            let stream = match self.pending[0] {
                2 => LogStream::Stderr,
                _ => LogStream::Stdout,
            };
            let frame: Vec<u8> = self.pending.drain(..HEADER_LEN + size).skip(HEADER_LEN).collect();
            let buf = match stream {
                LogStream::Stderr => &mut self.stderr,
                LogStream::Stdout => &mut self.stdout,
            };
            buf.extend_from_slice(&frame);
            drain_lines(buf, stream, &mut lines);
        }
        lines
    }

    /// Flush partial lines left when the body ends.
    pub(crate) fn finish(&mut self) -> Vec<LogLine> {
        let mut lines = Vec::new();
        for (buf, stream) in [
            (&mut self.stdout, LogStream::Stdout),
            (&mut self.stderr, LogStream::Stderr),
        ] {
            if !buf.is_empty() {
                buf.push(b'\n');
                drain_lines(buf, stream, &mut lines);
            }
        }
        self.pending.clear();
        lines
    }
}

fn drain_lines(buf: &mut Vec<u8>, stream: LogStream, out: &mut Vec<LogLine>) {
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let raw: Vec<u8> = buf.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw);
        out.push(LogLine {
            stream,
            content: text.trim_end_matches(['\n', '\r']).to_string(),
        });
    }
}
