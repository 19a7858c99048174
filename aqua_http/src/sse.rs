//! Server-sent event framing over any buffered reader.
//!
//! Follows the `text/event-stream` line rules: `field: value` lines build up
//! an event, a blank line dispatches it, lines starting with `:` are comments.
//! Events with no `data` are dropped on dispatch.
use std::io::BufRead;

use aqua_traits::{BoxError, EventStream, ServerEvent};

use crate::error::HttpError;

const DEFAULT_EVENT: &str = "message";

pub struct SseReader<R> {
    reader: R,
    line: String,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl<R: BufRead> SseReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            event: None,
            data: Vec::new(),
            last_id: None,
        }
    }

    /// Read until the next dispatchable event or end of stream.
    pub fn read_event(&mut self) -> crate::error::Result<Option<ServerEvent>> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                    HttpError::StreamIdle
                }
                _ => HttpError::Io(e),
            })?;
            if n == 0 {
                // EOF discards a partially built event.
                return Ok(None);
            }
            let line = self.line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if let Some(ev) = self.dispatch() {
                    return Ok(Some(ev));
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                "id" => self.last_id = Some(value.to_string()),
                // retry and unknown fields carry nothing for us
                _ => {}
            }
        }
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(ServerEvent {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

impl<R: BufRead> EventStream for SseReader<R> {
    fn next_event(&mut self) -> Result<Option<ServerEvent>, BoxError> {
        self.read_event().map_err(|e| Box::new(e) as BoxError)
    }
}
