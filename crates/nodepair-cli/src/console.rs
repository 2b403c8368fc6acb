//! Key presses on the local console.
//!
//! Reading keys blocks, so it runs on a blocking thread that polls the
//! terminal and checks its cancellation token between polls. The terminal is
//! in raw mode while a key is awaited; log output goes through
//! [`ConsoleStderr`] so its lines still start at the left margin.

use std::borrow::Cow;
use std::io::{self, Write};
use std::time::Duration;

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal;
use nodepair_control::AbortSignal;
use tokio_util::sync::CancellationToken;

/// How often the blocking reader checks for cancellation.
pub const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw mode for as long as the guard lives.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Expand bare `\n` into `\r\n`.
fn to_crlf(buf: &[u8]) -> Cow<'_, [u8]> {
    if !buf.contains(&b'\n') {
        return Cow::Borrowed(buf);
    }

    let mut out = Vec::with_capacity(buf.len() + 8);
    let mut prev = 0u8;
    for &b in buf {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    Cow::Owned(out)
}

/// Stderr writer for the log subscriber.
///
/// Raw mode turns off output post-processing, so line feeds are expanded
/// to carriage return + line feed while it is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleStderr;

impl Write for ConsoleStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut stderr = io::stderr().lock();
        if terminal::is_raw_mode_enabled().unwrap_or(false) {
            stderr.write_all(&to_crlf(buf))?;
        } else {
            stderr.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Block until a key is pressed (`true`) or `cancel` fires (`false`).
fn wait_for_key(cancel: &CancellationToken, poll: Duration) -> io::Result<bool> {
    let _raw = RawMode::enable()?;

    loop {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        if event::poll(poll)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(true);
                }
            }
        }
    }
}

/// Wait for a key press on a blocking thread.
///
/// Returns `None` if the console cannot be read at all.
async fn key_press(cancel: CancellationToken) -> Option<bool> {
    let result = tokio::task::spawn_blocking(move || wait_for_key(&cancel, KEY_POLL_INTERVAL)).await;

    match result {
        Ok(Ok(pressed)) => Some(pressed),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Console is not interactive");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Console reader failed");
            None
        }
    }
}

/// Wait for any key, giving up silently on a non-interactive console.
pub async fn any_key() {
    let _ = key_press(CancellationToken::new()).await;
}

/// Abort signal fired by any key press on the console.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyWatcher;

#[async_trait]
impl AbortSignal for KeyWatcher {
    async fn aborted(&self, cancel: CancellationToken) -> bool {
        match key_press(cancel.clone()).await {
            Some(pressed) => pressed,
            None => {
                // nothing to watch; stay out of the race
                cancel.cancelled().await;
                false
            }
        }
    }
}
