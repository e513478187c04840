//! Catch-all parser: wraps the raw line as a generic event.

use std::collections::HashMap;

use sentinel_core::{EventKind, EventSource, ParsedEvent};

/// Always succeeds; the whole line lands in the `message` field.
pub fn parse(line: &str, timestamp: f64) -> Option<ParsedEvent> {
    let mut fields = HashMap::new();
    fields.insert("message".to_string(), line.to_string());

    Some(
        ParsedEvent::new(EventSource::Generic, timestamp, line, EventKind::Generic)
            .with_fields(fields),
    )
}
