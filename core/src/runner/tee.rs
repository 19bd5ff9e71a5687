use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

use super::events::{EventSink, LogChannel, LogEvent, SupervisorEvent};

/// Spawns a reader that forwards every line of `reader` to `sink` until EOF.
///
/// Bytes are decoded lossily so a stray non-UTF-8 byte never ends the stream.
/// A final line without a trailing newline is still emitted.
pub(crate) fn pump_lines<R>(
    reader: R,
    channel: LogChannel,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);
        let mut lines = 0u64;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = decode_line(&buf);
                    sink.emit(SupervisorEvent::Log(LogEvent::new(channel, line)));
                    lines += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "hk3.supervisor",
                        channel = channel.as_str(),
                        error = %e,
                        "output reader failed"
                    );
                    break;
                }
            }
        }
        tracing::debug!(
            target: "hk3.supervisor",
            channel = channel.as_str(),
            lines,
            "output reader reached end of stream"
        );
        lines
    })
}

fn decode_line(buf: &[u8]) -> String {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && buf[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<SupervisorEvent>>);

    impl EventSink for Collect {
        fn emit(&self, event: SupervisorEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn messages(sink: &Collect) -> Vec<String> {
        sink.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SupervisorEvent::Log(ev) => Some(ev.message.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_decode_line_strips_crlf() {
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"abc\n"), "abc");
        assert_eq!(decode_line(b"abc"), "abc");
        assert_eq!(decode_line(b"\n"), "");
    }

    #[tokio::test]
    async fn test_pump_flushes_unterminated_final_line() {
        let sink = Arc::new(Collect::default());
        let input: &'static [u8] = b"one\ntwo\r\nthree";
        let n = pump_lines(input, LogChannel::Stdout, sink.clone())
            .await
            .unwrap();

        assert_eq!(n, 3);
        assert_eq!(messages(&sink), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_pump_survives_invalid_utf8() {
        let sink = Arc::new(Collect::default());
        let input: &'static [u8] = b"ok\n\xff\xfe bad\nafter\n";
        pump_lines(input, LogChannel::Stderr, sink.clone())
            .await
            .unwrap();

        let got = messages(&sink);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], "ok");
        assert!(got[1].ends_with(" bad"));
        assert_eq!(got[2], "after");
    }
}
