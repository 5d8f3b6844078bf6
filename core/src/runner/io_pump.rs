use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::types::{CommandLog, LogChannel, OutputTarget};

/// Longest line forwarded as one log entry; longer lines are split.
pub const MAX_LINE_SIZE: usize = 4096;

/// Copies a child stream to `target`, optionally tapping complete lines
/// into `line_tx`. Resolves to the number of bytes copied.
pub(crate) fn pump<R>(
    mut rd: R,
    target: OutputTarget,
    channel: LogChannel,
    line_tx: Option<mpsc::Sender<CommandLog>>,
) -> JoinHandle<std::io::Result<u64>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut wr = target.writer(channel);
        let mut buf = vec![0u8; 16 * 1024];
        let mut total = 0u64;
        let mut line_buf: Vec<u8> = Vec::with_capacity(MAX_LINE_SIZE);
        let mut line_no = 0u64;

        loop {
            let n = rd.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            wr.write_all(&buf[..n]).await?;
            total += n as u64;

            let Some(tx) = line_tx.as_ref() else {
                continue;
            };

            line_buf.extend_from_slice(&buf[..n]);
            loop {
                let cut = match line_buf.iter().position(|&b| b == b'\n') {
                    Some(pos) => pos + 1,
                    None if line_buf.len() >= MAX_LINE_SIZE => MAX_LINE_SIZE,
                    None => break,
                };
                let one: Vec<u8> = line_buf.drain(..cut).collect();
                line_no += 1;
                let _ = tx.send(entry(channel, line_no, one)).await;
            }
        }

        // EOF: deliver the last partial line.
        if let Some(tx) = line_tx.as_ref() {
            if !line_buf.is_empty() {
                line_no += 1;
                let _ = tx.send(entry(channel, line_no, line_buf)).await;
            }
        }

        wr.flush().await?;
        Ok(total)
    })
}

fn entry(channel: LogChannel, line: u64, mut bytes: Vec<u8>) -> CommandLog {
    trim_newline(&mut bytes);
    CommandLog {
        channel,
        line,
        message: String::from_utf8_lossy(&bytes).into_owned(),
        timestamp: Utc::now(),
    }
}

fn trim_newline(v: &mut Vec<u8>) {
    if v.last() == Some(&b'\n') {
        v.pop();
    }
    if v.last() == Some(&b'\r') {
        v.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::types::SharedBuffer;

    #[tokio::test]
    async fn test_pump_copies_and_taps_lines() {
        let (tx, mut rx) = mpsc::channel(16);
        let out = SharedBuffer::new();
        let data: &'static [u8] = b"first\r\nsecond\nlast";

        let copied = pump(data, OutputTarget::Buffer(out.clone()), LogChannel::Stdout, Some(tx))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(out.contents(), "first\r\nsecond\nlast");

        let mut lines = Vec::new();
        while let Some(log) = rx.recv().await {
            lines.push((log.line, log.message));
        }
        assert_eq!(
            lines,
            vec![
                (1, "first".to_string()),
                (2, "second".to_string()),
                (3, "last".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_long_lines_are_split() {
        let (tx, mut rx) = mpsc::channel(16);
        let data: &'static [u8] = Box::leak(vec![b'x'; MAX_LINE_SIZE + 10].into_boxed_slice());
        pump(data, OutputTarget::Null, LogChannel::Stderr, Some(tx))
            .await
            .unwrap()
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.message.len(), MAX_LINE_SIZE);
        assert_eq!(second.message.len(), 10);
        assert_eq!(second.channel, LogChannel::Stderr);
    }
}
