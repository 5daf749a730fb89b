use crate::types::Line;
use bytes::{Buf, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Splits a child's output pipe into lines as the bytes arrive.
///
/// `next_line` is cancel safe: partial input stays in the buffer, so it can be used as a
/// `select!` branch.
pub struct LineReader<R> {
    reader: R,
    buf: BytesMut,
    // bytes of `buf` already known to hold no newline
    searched: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(4096),
            searched: 0,
            eof: false,
        }
    }

    /// The next line with trailing whitespace trimmed, or `None` once the pipe is closed.
    ///
    /// An unterminated fragment at end of stream is returned as a final line.
    pub async fn next_line(&mut self) -> io::Result<Option<Line>> {
        loop {
            if let Some(pos) = self.buf[self.searched..].iter().position(|&b| b == b'\n') {
                let raw = self.buf.split_to(self.searched + pos + 1);
                self.searched = 0;
                return Ok(Some(decode(&raw)));
            }
            self.searched = self.buf.len();
            if self.eof {
                if self.buf.has_remaining() {
                    let raw = self.buf.split();
                    self.searched = 0;
                    return Ok(Some(decode(&raw)));
                }
                return Ok(None);
            }
            if self.reader.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
    }
}

fn decode(raw: &[u8]) -> Line {
    String::from_utf8_lossy(raw).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &'static [u8]) -> Vec<Line> {
        let mut reader = LineReader::new(input);
        let mut lines = vec![];
        while let Some(line) = reader.next_line().await.expect("read from slice") {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn splits_and_trims() {
        assert_eq!(collect(b"A\nB\r\n  C  \n").await, vec!["A", "B", "  C"]);
    }

    #[tokio::test]
    async fn keeps_unterminated_tail_and_blank_lines() {
        assert_eq!(collect(b"one\n\ntwo").await, vec!["one", "", "two"]);
        assert!(collect(b"").await.is_empty());
    }

    #[tokio::test]
    async fn replaces_invalid_utf8() {
        assert_eq!(collect(b"ok \xff\n").await, vec!["ok \u{fffd}"]);
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_reads() {
        let (mut writer, reader) = tokio::io::duplex(8);
        let mut lines = LineReader::new(reader);
        let producer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            writer.write_all(b"a fairly long first line\nsecond").await.unwrap();
        });
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("a fairly long first line")
        );
        producer.await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn long_lines_are_not_rescanned() {
        const LEN: usize = 32 * 1024 * 1024;
        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        let producer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            writer.write_all(&vec![b'x'; LEN]).await.unwrap();
            writer.write_all(b"\nshort\n").await.unwrap();
        });
        let mut lines = LineReader::new(reader);

        let started = std::time::Instant::now();
        let long = lines.next_line().await.unwrap().expect("long line");
        assert_eq!(long.len(), LEN);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("short"));
        producer.await.unwrap();
        // rescanning from the start after every 64 KiB read would walk ~8 GiB here
        assert!(started.elapsed() < std::time::Duration::from_secs(3));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
