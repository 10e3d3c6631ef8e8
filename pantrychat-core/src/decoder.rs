//! Incremental NDJSON framing for the upstream token stream.
//!
//! Bytes are buffered across chunks; only complete `\n`-terminated lines are
//! parsed. Lines that fail to parse are dropped and counted, never surfaced.

use crate::model::DecodedRecord;

/// Longest line the decoder will buffer before giving up on it.
pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;

#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    malformed: usize,
    max_line: usize,
    /// Set after an oversize fragment was thrown away; bytes are skipped up to the next newline.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            malformed: 0,
            max_line,
            discarding: false,
        }
    }

    /// Append `chunk` and return the records of every line it completes.
    /// A trailing unterminated fragment stays buffered for the next call.
    /// Lines longer than the cap are dropped and counted as malformed.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Records<'_> {
        if self.discarding {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(idx) => {
                    chunk = &chunk[idx + 1..];
                    self.discarding = false;
                }
                None => chunk = &[],
            }
        }
        self.buf.extend_from_slice(chunk);
        let complete = match self.buf.iter().rposition(|b| *b == b'\n') {
            Some(idx) => self.buf.drain(..=idx).collect(),
            None => Vec::new(),
        };
        if self.buf.len() > self.max_line {
            tracing::warn!(
                pending = self.buf.len(),
                max_line = self.max_line,
                "upstream line exceeds limit, dropping it"
            );
            self.buf.clear();
            self.discarding = true;
            self.malformed += 1;
        }
        Records {
            data: complete,
            pos: 0,
            max_line: self.max_line,
            malformed: &mut self.malformed,
        }
    }

    /// Final parse attempt on whatever fragment is left once the upstream has closed.
    pub fn finish(&mut self) -> Option<DecodedRecord> {
        self.discarding = false;
        let tail = std::mem::take(&mut self.buf);
        parse_line(&tail, &mut self.malformed)
    }

    /// Bytes buffered but not yet terminated by a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Lines dropped because they were not valid records.
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

/// Lazy iterator over the complete lines taken by one `feed` call.
pub struct Records<'a> {
    data: Vec<u8>,
    pos: usize,
    max_line: usize,
    malformed: &'a mut usize,
}

impl Iterator for Records<'_> {
    type Item = DecodedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let rest = &self.data[self.pos..];
            let end = rest.iter().position(|b| *b == b'\n').unwrap_or(rest.len());
            let line = &rest[..end];
            self.pos += end + 1;
            if line.len() > self.max_line {
                *self.malformed += 1;
                tracing::warn!(len = line.len(), "upstream line exceeds limit, dropping it");
                continue;
            }
            if let Some(rec) = parse_line(line, self.malformed) {
                return Some(rec);
            }
        }
        None
    }
}

fn parse_line(line: &[u8], malformed: &mut usize) -> Option<DecodedRecord> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<DecodedRecord>(line) {
        Ok(rec) => Some(rec),
        Err(e) => {
            *malformed += 1;
            tracing::debug!(error = %e, len = line.len(), "dropping malformed upstream line");
            None
        }
    }
}
