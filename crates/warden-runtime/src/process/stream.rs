//! Async stream log readers (non-UTF8-safe).
//!
//! Game servers and their launch scripts can emit non-UTF8 bytes on
//! stdout/stderr. Using `BufReader::lines()` would terminate the reader task
//! on invalid UTF-8, so lines are read as bytes and decoded lossily.
//! Draining both pipes also keeps a chatty child from blocking on a full pipe.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    name: String,
    stream_type: &'static str,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let line = String::from_utf8_lossy(&buf);
                    debug!(process = %name, %stream_type, "{line}");
                }
                Err(e) => {
                    debug!(process = %name, %stream_type, error = %e, "output reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(process = %name, %stream_type, "output reader task exiting");
    });
}
