//! Console output for the node side.

use std::io::{self, Write};
use std::time::Duration;

use async_trait::async_trait;
use nodepair_control::{EnrollmentUi, NodeConfig, Token};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::console;

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const SPINNER_TICK: Duration = Duration::from_millis(80);

const BANNER_TITLE: &str = "Installation";

const INSTRUCTIONS: &str = "Welcome to nodepair!
p2p device installation enrollment is starting.
A QR code will be displayed below.
In another machine, run \"nodepair register\" with the QR code visible on screen,
or \"nodepair register <file>\" to register the machine from a photo.
If the QR code is not displaying correctly,
try booting with another vga option from the boot cmdline (e.g. vga=791).";

/// Text shown while waiting for a payload.
pub const WAITING_TEXT: &str = "p2p device enrollment started, press any key to abort pairing \
and drop to shell. To re-start enrollment, run 'nodepair install'. Waiting for registration.";

/// Get the spinner character for animation frame `frame`.
#[must_use]
pub fn spinner_char(frame: usize) -> &'static str {
    SPINNER[frame % SPINNER.len()]
}

/// Draw `body` in a box with `title` on the bottom border, right aligned.
#[must_use]
pub fn boxed(title: &str, body: &str) -> String {
    let width = body
        .lines()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(title.chars().count() + 2);

    let mut out = String::new();
    out.push('┌');
    out.push_str(&"─".repeat(width + 2));
    out.push_str("┐\n");

    for line in body.lines() {
        let pad = width - line.chars().count();
        out.push_str("│ ");
        out.push_str(line);
        out.push_str(&" ".repeat(pad));
        out.push_str(" │\n");
    }

    let rule = width + 1 - title.chars().count();
    out.push('└');
    out.push_str(&"─".repeat(rule));
    out.push(' ');
    out.push_str(title);
    out.push_str("┘\n");
    out
}

struct Spinner {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Terminal implementation of the enrollment screen.
pub struct TerminalUi {
    spinner_enabled: bool,
    spinner: Mutex<Option<Spinner>>,
}

impl TerminalUi {
    /// Create the UI; `spinner_enabled` animates the waiting line.
    #[must_use]
    pub const fn new(spinner_enabled: bool) -> Self {
        Self {
            spinner_enabled,
            spinner: Mutex::new(None),
        }
    }

    /// Build the UI from the environment (`NOSPINNER=true` disables the spinner).
    #[must_use]
    pub fn from_env() -> Self {
        let no_spinner = std::env::var("NOSPINNER").is_ok_and(|v| v == "true");
        Self::new(!no_spinner)
    }
}

#[async_trait]
impl EnrollmentUi for TerminalUi {
    fn show_instructions(&self, start_delay: Duration) {
        print!("{}", boxed(BANNER_TITLE, INSTRUCTIONS));
        println!("Starting in {} seconds...\n\n", start_delay.as_secs());
    }

    fn show_token(&self, token: &Token) {
        match nodepair_qr::encode(token) {
            Ok(code) => println!("{code}"),
            Err(e) => tracing::warn!(error = %e, "Cannot render QR code"),
        }
        println!("{token}\n");
    }

    fn waiting_started(&self) {
        if !self.spinner_enabled {
            println!("{WAITING_TEXT}");
            return;
        }

        let stop = CancellationToken::new();
        let task = tokio::spawn({
            let stop = stop.clone();
            async move {
                let mut tick = tokio::time::interval(SPINNER_TICK);
                let mut frame = 0usize;
                loop {
                    tokio::select! {
                        () = stop.cancelled() => break,
                        _ = tick.tick() => {
                            print!("\r{} {WAITING_TEXT}", spinner_char(frame));
                            let _ = io::stdout().flush();
                            frame = frame.wrapping_add(1);
                        }
                    }
                }
            }
        });

        *self.spinner.lock() = Some(Spinner { stop, task });
    }

    fn waiting_finished(&self) {
        if let Some(spinner) = self.spinner.lock().take() {
            spinner.stop.cancel();
            spinner.task.abort();
            println!("\r");
        }
    }

    fn installing(&self, config: &NodeConfig) {
        println!("Starting installation on {}", config.device);
    }

    async fn acknowledge(&self, prompt: &str) {
        println!("{prompt}");
        console::any_key().await;
    }
}
