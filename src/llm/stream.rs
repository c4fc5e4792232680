use std::io::BufRead;

use crate::error::GenerationError;
use crate::llm::http::TransportError;

/// Outcome of parsing one line of an incremental response.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Skip,
    Done,
}

/// Drain a line-delimited streaming response into one string.
///
/// The whole body is consumed before returning; callers never see partial text.
pub fn read_stream_to_string<R, F>(reader: R, mut parse_line: F) -> Result<String, GenerationError>
where
    R: BufRead,
    F: FnMut(&str) -> Result<StreamEvent, GenerationError>,
{
    let mut out = String::new();
    let mut chunks = 0usize;

    for line in reader.lines() {
        let line = line.map_err(|e| TransportError::Other {
            host: String::new(),
            detail: format!("stream interrupted: {e}"),
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line)? {
            StreamEvent::Chunk(chunk) => {
                chunks += 1;
                log::trace!("stream chunk {chunks}: {chunk:?}");
                out.push_str(&chunk);
            }
            StreamEvent::Skip => {}
            StreamEvent::Done => break,
        }
    }

    log::debug!("Stream finished after {chunks} chunk(s), {} chars", out.len());

    Ok(out)
}
