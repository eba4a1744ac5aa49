//! Event definitions
//!
//! Defines the durable record and its one-line text encoding.

use serde::Serialize;

use crate::error::{LedgerError, Result};

/// Kind of mutation recorded by an event
///
/// The discriminants are the on-disk codes and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum EventKind {
    Delete = 1,
    Put = 2,
}

impl EventKind {
    /// On-disk code
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(EventKind::Delete),
            2 => Some(EventKind::Put),
            _ => None,
        }
    }
}

/// A single durable mutation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Commit order; 0 until the background writer persists the event
    pub sequence: u64,

    pub kind: EventKind,

    pub key: String,

    /// Always empty for `Delete`
    pub value: String,
}

impl Event {
    /// Unsequenced Put event
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: EventKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Unsequenced Delete event
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: EventKind::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// Encode as `sequence\tkind\tkey\tvalue\n`
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\n",
            self.sequence,
            self.kind.code(),
            self.key,
            self.value
        )
    }

    /// Decode one line (without its trailing newline).
    ///
    /// `line_no` is 1-based and only used for error reporting.
    pub fn parse_line(line: &str, line_no: u64) -> Result<Self> {
        let mut fields = line.splitn(4, '\t');
        let (Some(sequence), Some(kind), Some(key), Some(value)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(LedgerError::corrupt(
                line_no,
                format!("expected 4 tab-separated fields in {:?}", line),
            ));
        };

        let sequence = sequence.parse::<u64>().map_err(|_| {
            LedgerError::corrupt(line_no, format!("invalid sequence {:?}", sequence))
        })?;
        let kind = kind
            .parse::<i64>()
            .ok()
            .and_then(EventKind::from_code)
            .ok_or_else(|| LedgerError::corrupt(line_no, format!("invalid event kind {:?}", kind)))?;

        Self::from_parts(sequence, kind, key.to_string(), value.to_string(), line_no)
    }

    /// Build a replayed event, enforcing the record invariants.
    pub(crate) fn from_parts(
        sequence: u64,
        kind: EventKind,
        key: String,
        value: String,
        position: u64,
    ) -> Result<Self> {
        if sequence == 0 {
            return Err(LedgerError::corrupt(position, "sequence must start at 1"));
        }
        if key.is_empty() {
            return Err(LedgerError::corrupt(position, "empty key"));
        }
        if kind == EventKind::Delete && !value.is_empty() {
            return Err(LedgerError::corrupt(position, "delete event carries a value"));
        }

        Ok(Self {
            sequence,
            kind,
            key,
            value,
        })
    }
}

/// Reject keys and values the line format cannot represent.
pub fn check_text_fields(key: &str, value: &str) -> Result<()> {
    if key.is_empty() {
        return Err(LedgerError::InvalidKey("key must not be empty".to_string()));
    }
    if key.contains(&['\t', '\n', '\r'][..]) {
        return Err(LedgerError::InvalidKey(
            "key must not contain tabs or line breaks".to_string(),
        ));
    }
    if value.contains(&['\n', '\r'][..]) {
        return Err(LedgerError::InvalidKey(
            "value must not contain line breaks".to_string(),
        ));
    }
    Ok(())
}

/// Enforces strictly increasing sequences while scanning a medium
#[derive(Debug, Default)]
pub(crate) struct SequenceGuard {
    previous: u64,
}

impl SequenceGuard {
    pub(crate) fn check(&mut self, event: &Event, position: u64) -> Result<()> {
        if event.sequence <= self.previous {
            return Err(LedgerError::corrupt(
                position,
                format!(
                    "sequence {} does not follow {}",
                    event.sequence, self.previous
                ),
            ));
        }
        self.previous = event.sequence;
        Ok(())
    }
}
