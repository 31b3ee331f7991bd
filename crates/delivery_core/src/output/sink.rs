//! Destinations for serialized output events.

use std::io::Write;

use crate::error::SinkError;

/// Receives serialized events, one message per call, in emission order.
pub trait OutputSink: Send {
    fn write_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError>;

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Vec<(String, Vec<u8>)>,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[(String, Vec<u8>)] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Parsed payloads published on `topic`, in order. Unparseable payloads
    /// are skipped.
    pub fn events_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.messages
            .iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Topic of every message, in order.
    pub fn topics(&self) -> Vec<&str> {
        self.messages.iter().map(|(t, _)| t.as_str()).collect()
    }
}

impl OutputSink for MemorySink {
    fn write_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.messages.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }
}

/// Writes one line per message: `{"topic":"…","event":{…}}`.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: Option<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }

    /// Give back the underlying writer, flushing it first.
    pub fn into_inner(mut self) -> Result<W, SinkError> {
        let mut writer = self.writer.take().ok_or(SinkError::Closed)?;
        writer.flush()?;
        Ok(writer)
    }
}

impl<W: Write + Send> OutputSink for JsonLinesSink<W> {
    fn write_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        let mut line = Vec::with_capacity(payload.len() + topic.len() + 24);
        line.extend_from_slice(b"{\"topic\":");
        serde_json::to_writer(&mut line, topic)?;
        line.extend_from_slice(b",\"event\":");
        line.extend_from_slice(payload);
        line.extend_from_slice(b"}\n");
        writer.write_all(&line)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
