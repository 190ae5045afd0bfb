use indexmap::IndexMap;

/// Event name carrying the generated image in its `data` field.
pub const NEW_IMAGE_EVENT: &str = "newImage";

/// One record decoded from a `text/event-stream` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEvent {
    fields: IndexMap<String, Option<String>>,
}

impl StreamEvent {
    fn with_id(raw: &str) -> Self {
        let mut event = Self::default();
        event.fields.insert("id".to_string(), Some(raw.to_string()));
        event
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|value| value.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn id(&self) -> Option<i64> {
        self.fields
            .get("id")
            .map(|value| parse_event_id(value.as_deref().unwrap_or("")))
    }

    pub fn name(&self) -> Option<&str> {
        self.get("event")
    }

    pub fn data(&self) -> Option<&str> {
        self.get("data")
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Groups `key: value` lines into events. A line `id: N` opens a new event
/// only when the current event already carries a different numeric id.
#[derive(Debug, Clone)]
pub struct EventStreamDecoder {
    events: Vec<StreamEvent>,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self {
            events: vec![StreamEvent::default()],
        }
    }
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return;
        }
        let (key, value) = match line.split_once(':') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (line.trim(), None),
        };

        if key == "id" {
            let incoming = parse_event_id(value.unwrap_or(""));
            if let Some(current) = self.current().id() {
                if current != incoming {
                    self.events
                        .push(StreamEvent::with_id(value.unwrap_or("")));
                    return;
                }
            }
        }

        self.current_mut()
            .fields
            .insert(key.to_string(), value.map(str::to_string));
    }

    pub fn finish(self) -> Vec<StreamEvent> {
        self.events
    }

    fn current(&self) -> &StreamEvent {
        // The accumulator list is never empty.
        &self.events[self.events.len() - 1]
    }

    fn current_mut(&mut self) -> &mut StreamEvent {
        let last = self.events.len() - 1;
        &mut self.events[last]
    }
}

pub fn decode_event_stream(body: &str) -> Vec<StreamEvent> {
    let mut decoder = EventStreamDecoder::new();
    for line in body.split('\n') {
        decoder.push_line(line);
    }
    let events = decoder.finish();
    tracing::debug!(count = events.len(), "decoded event stream");
    events
}

pub fn find_terminal_event<'a>(events: &'a [StreamEvent], marker: &str) -> Option<&'a StreamEvent> {
    events.iter().find(|event| event.name() == Some(marker))
}

/// Leading optional sign and digits; anything unparsable is `0`.
fn parse_event_id(raw: &str) -> i64 {
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end]
        .parse::<i64>()
        .map(|value| sign * value)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{decode_event_stream, find_terminal_event, parse_event_id, NEW_IMAGE_EVENT};

    #[test]
    fn single_event_without_id() {
        let events = decode_event_stream("event: newImage\ndata: QUJD\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), Some("newImage"));
        assert_eq!(events[0].data(), Some("QUJD"));
        assert_eq!(events[0].id(), None);
    }

    #[test]
    fn changed_id_starts_a_new_event() {
        let events =
            decode_event_stream("id: 1\nevent: ping\nid: 2\nevent: newImage\ndata: WFlg\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id(), Some(1));
        assert_eq!(events[0].name(), Some("ping"));
        assert_eq!(events[1].id(), Some(2));
        assert_eq!(events[1].name(), Some("newImage"));
        assert_eq!(events[1].data(), Some("WFlg"));
    }

    #[test]
    fn repeated_id_accumulates_into_same_event() {
        let events = decode_event_stream("id: 7\nevent: a\nid: 7\ndata: x\nevent: b\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), Some("b"));
        assert_eq!(events[0].data(), Some("x"));
    }

    #[test]
    fn value_keeps_text_after_first_colon() {
        let events = decode_event_stream("data: a:b:c\r\nflag\n");
        assert_eq!(events[0].data(), Some("a:b:c"));
        assert!(events[0].contains("flag"));
        assert_eq!(events[0].get("flag"), None);
    }

    #[test]
    fn blank_lines_are_skipped_and_empty_body_yields_one_empty_event() {
        let events = decode_event_stream("\n\nevent: ping\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), Some("ping"));

        let empty = decode_event_stream("");
        assert_eq!(empty.len(), 1);
        assert!(empty[0].is_empty());
    }

    #[test]
    fn terminal_event_is_first_match_in_order() {
        let events = decode_event_stream(
            "id: 1\nevent: newImage\ndata: first\nid: 2\nevent: newImage\ndata: second\n",
        );
        let found = find_terminal_event(&events, NEW_IMAGE_EVENT).map(|event| event.data());
        assert_eq!(found, Some(Some("first")));
        assert!(find_terminal_event(&events, "done").is_none());
    }

    #[test]
    fn event_ids_parse_leading_digits() {
        assert_eq!(parse_event_id("42"), 42);
        assert_eq!(parse_event_id(" -3 "), -3);
        assert_eq!(parse_event_id("12abc"), 12);
        assert_eq!(parse_event_id("abc"), 0);
        assert_eq!(parse_event_id(""), 0);
    }
}
