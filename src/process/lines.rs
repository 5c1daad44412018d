// ABOUTME: Line reader for child process pipes that may carry arbitrary bytes.
// ABOUTME: Undecodable bytes are replaced instead of ending the stream.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Lines of a pipe, decoded lossily, without their terminator.
///
/// Reading goes on until EOF whatever the bytes are, so the writer never
/// stalls on a full pipe because one line was not UTF-8.
pub struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// The next line, or `None` at EOF or once the pipe fails.
    pub async fn next_line(&mut self) -> Option<String> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf).await {
            Ok(0) => None,
            Ok(_) => {
                let line = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf[..]);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                Some(String::from_utf8_lossy(line).into_owned())
            }
            Err(e) => {
                tracing::debug!("pipe read failed: {}", e);
                None
            }
        }
    }
}
