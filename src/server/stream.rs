use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Socket read/write timeout; bounds how long a stop request can go unseen.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Wraps a stream whose reads and writes time out periodically.
///
/// A timeout is retried while `stop` is unset, so a slow client still holds
/// the connection. Once `stop` is set the timeout surfaces as `TimedOut`,
/// which `read_until` and `write_all` do not retry.
pub struct StopAware<'a, S> {
    inner: S,
    stop: &'a AtomicBool,
}

impl<'a, S> StopAware<'a, S> {
    pub fn new(inner: S, stop: &'a AtomicBool) -> Self {
        Self { inner, stop }
    }

    fn retry<T>(&mut self, mut op: impl FnMut(&mut S) -> io::Result<T>) -> io::Result<T> {
        loop {
            match op(&mut self.inner) {
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    if self.stop.load(Ordering::SeqCst) {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "server stopping, connection abandoned",
                        ));
                    }
                }
                result => return result,
            }
        }
    }
}

impl<S: Read> Read for StopAware<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.retry(|inner| inner.read(buf))
    }
}

impl<S: Write> Write for StopAware<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.retry(|inner| inner.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.retry(|inner| inner.flush())
    }
}
