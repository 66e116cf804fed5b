/// Reads lines from `reader` on a background task and hands them out through a
/// bounded channel, so payloads can be sent while stdin is still being read.
///
/// Lines arrive without their trailing newline. Reading stops at EOF, on the
/// first I/O error (which is logged), or once the receiver is dropped. With a
/// full channel the reader task waits for the consumer.
pub fn concurrent_lines<R: tokio::io::AsyncRead + Unpin + Send + 'static>(
    reader: R,
    channel_capacity: usize,
) -> (
    tokio::task::JoinHandle<()>,
    tokio::sync::mpsc::Receiver<String>,
) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let (tx, rx) = tokio::sync::mpsc::channel::<String>(channel_capacity);
    let buffer = BufReader::new(reader);

    let task = tokio::spawn(async move {
        let mut lines = buffer.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Err(e) = tx.send(line).await {
                        log::error!("Channel closed unexpectedly while sending line: {e}");
                        break;
                    }
                }
                Ok(None) => {
                    log::trace!("Reached EOF, exiting reader task");
                    break;
                }
                Err(e) => {
                    log::error!("I/O error while reading lines: {e}. Stopping reader.");
                    break;
                }
            }
        }
    });

    (task, rx)
}
