use std::collections::VecDeque;

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence, so
/// the buffer holds raw bytes until a full line is available. Only `data`
/// fields are kept; an event's data lines are joined with `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
    ready: VecDeque<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            self.feed_line(line.strip_suffix('\r').unwrap_or(&line));
        }
    }

    pub fn next_event(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.feed_line(line.strip_suffix('\r').unwrap_or(&line));
        }
        self.dispatch();
        self.ready.pop_front()
    }

    fn feed_line(&mut self, line: &str) {
        if line.is_empty() {
            self.dispatch();
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field != "data" {
            return;
        }

        match self.data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => self.data = Some(value.to_string()),
        }
    }

    fn dispatch(&mut self) {
        if let Some(data) = self.data.take() {
            self.ready.push_back(data);
        }
    }
}
