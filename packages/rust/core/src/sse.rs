//! Server-push framing for progress streams.
//!
//! Each event becomes one `data:` frame terminated by a blank line. Terminal
//! events carry a reserved prefix (`COMPLETED:` / `ERROR:`) so a consumer can
//! tell them from ordinary status text without any other envelope.

use std::time::Duration;

use futures::Stream;

use mdigest_shared::ProgressEvent;

use crate::progress::Subscription;

/// Payload sent when nothing happened within the keep-alive interval.
pub const KEEPALIVE: &str = "KEEPALIVE";

/// Prefix of the success payload.
pub const COMPLETED_PREFIX: &str = "COMPLETED:";

/// Prefix of the failure payload.
pub const ERROR_PREFIX: &str = "ERROR:";

/// Default keep-alive interval.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(1);

/// Whether `text` would be read back as a keep-alive or a terminal payload.
fn is_reserved(text: &str) -> bool {
    text == KEEPALIVE || text.starts_with(COMPLETED_PREFIX) || text.starts_with(ERROR_PREFIX)
}

/// Payload text for an event.
///
/// A message that collides with a reserved payload is sent with a leading
/// space so consumers still see it as plain text.
pub fn event_payload(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Message(text) if is_reserved(text) => format!(" {text}"),
        ProgressEvent::Message(text) => text.clone(),
        ProgressEvent::Completed(reference) => format!("{COMPLETED_PREFIX}{reference}"),
        ProgressEvent::Failed(message) => format!("{ERROR_PREFIX}{message}"),
    }
}

/// Frame a raw payload. Multi-line payloads get one `data:` line per line.
pub fn frame_payload(payload: &str) -> String {
    let mut frame = String::with_capacity(payload.len() + 8);
    for line in payload.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line.strip_suffix('\r').unwrap_or(line));
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

/// `data: <payload>\n\n` for one event.
pub fn frame_event(event: &ProgressEvent) -> String {
    frame_payload(&event_payload(event))
}

/// Stream framed events from `subscription`, inserting a keep-alive frame
/// whenever no event arrives within `keepalive`. Ends after the terminal
/// event.
pub fn event_stream(
    mut subscription: Subscription,
    keepalive: Duration,
) -> impl Stream<Item = String> + Send {
    async_stream::stream! {
        loop {
            match tokio::time::timeout(keepalive, subscription.next()).await {
                Ok(Some(event)) => {
                    let terminal = event.is_terminal();
                    yield frame_event(&event);
                    if terminal {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => yield frame_payload(KEEPALIVE),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer side
// ---------------------------------------------------------------------------

/// A decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPayload {
    KeepAlive,
    Message(String),
    Completed(String),
    Failed(String),
}

impl StreamPayload {
    /// Whether the consumer should stop reading.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Classify a payload (the text after `data: `).
pub fn parse_payload(payload: &str) -> StreamPayload {
    if payload == KEEPALIVE {
        StreamPayload::KeepAlive
    } else if let Some(reference) = payload.strip_prefix(COMPLETED_PREFIX) {
        StreamPayload::Completed(reference.to_string())
    } else if let Some(message) = payload.strip_prefix(ERROR_PREFIX) {
        StreamPayload::Failed(message.to_string())
    } else {
        StreamPayload::Message(payload.to_string())
    }
}

/// Decode one frame back into its payload, joining multi-line data.
pub fn parse_frame(frame: &str) -> Option<StreamPayload> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    (!lines.is_empty()).then(|| parse_payload(&lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::progress::ProgressEmitter;

    #[test]
    fn frames_events() {
        assert_eq!(
            frame_event(&ProgressEvent::message("batch 1/2 complete")),
            "data: batch 1/2 complete\n\n"
        );
        assert_eq!(
            frame_event(&ProgressEvent::Completed("output/a.pdf".into())),
            "data: COMPLETED:output/a.pdf\n\n"
        );
        assert_eq!(
            frame_event(&ProgressEvent::Failed("no content".into())),
            "data: ERROR:no content\n\n"
        );
    }

    #[test]
    fn multi_line_payload_round_trips() {
        let frame = frame_payload("line one\nline two");
        assert_eq!(frame, "data: line one\ndata: line two\n\n");
        assert_eq!(
            parse_frame(&frame),
            Some(StreamPayload::Message("line one\nline two".into()))
        );
    }

    #[test]
    fn reserved_looking_messages_stay_messages() {
        for text in ["KEEPALIVE", "COMPLETED:fake.pdf", "ERROR:not really"] {
            let frame = frame_event(&ProgressEvent::message(text));
            let payload = parse_frame(&frame).unwrap();
            assert_eq!(payload, StreamPayload::Message(format!(" {text}")));
            assert!(!payload.is_terminal());
        }
        assert_eq!(
            frame_event(&ProgressEvent::message("KEEPALIVE soon")),
            "data: KEEPALIVE soon\n\n"
        );
    }

    #[test]
    fn payload_classification() {
        assert_eq!(parse_payload("KEEPALIVE"), StreamPayload::KeepAlive);
        assert_eq!(
            parse_payload("COMPLETED:out.md"),
            StreamPayload::Completed("out.md".into())
        );
        assert!(parse_payload("ERROR:boom").is_terminal());
        assert!(!parse_payload("processing batch 1/1").is_terminal());
        assert_eq!(parse_frame("\n"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_interleaves_keepalive_and_ends_on_terminal() {
        let emitter = ProgressEmitter::default();
        let task = emitter.create_task();
        let stream = event_stream(emitter.subscribe(task.id()), Duration::from_secs(1));

        let producer = {
            let emitter = emitter.clone();
            let id = task.id().clone();
            tokio::spawn(async move {
                emitter.emit(&id, ProgressEvent::message("started"));
                tokio::time::sleep(Duration::from_millis(2500)).await;
                emitter.emit(&id, ProgressEvent::Completed("out.pdf".into()));
            })
        };

        let frames: Vec<String> = stream.collect().await;
        producer.await.unwrap();

        assert_eq!(frames.first().map(String::as_str), Some("data: started\n\n"));
        assert_eq!(
            frames.last().map(String::as_str),
            Some("data: COMPLETED:out.pdf\n\n")
        );
        let keepalives = frames.iter().filter(|f| f.as_str() == "data: KEEPALIVE\n\n").count();
        assert_eq!(keepalives, 2);
    }

    #[tokio::test]
    async fn unknown_task_stream_ends() {
        let emitter = ProgressEmitter::default();
        let frames: Vec<String> =
            event_stream(emitter.subscribe(&mdigest_shared::TaskId::new()), DEFAULT_KEEPALIVE)
                .collect()
                .await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("not found"));
    }
}
