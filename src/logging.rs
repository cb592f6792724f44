//! Tracing setup.
//!
//! One global subscriber: an `EnvFilter` built from the session's
//! `logFilter` directive plus a fmt layer. In the browser the fmt layer
//! writes whole lines to the devtools console; elsewhere it writes to
//! stderr.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const FALLBACK_FILTER: &str = "info";

/// Parse a filter directive. On error the fallback filter comes back with
/// the parse error so the caller can report it once logging is up.
pub fn build_filter(directive: &str) -> (EnvFilter, Option<ParseError>) {
    match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(FALLBACK_FILTER), Some(e)),
    }
}

/// Install the global subscriber. Later calls (a second session on the
/// same page) keep the first subscriber.
pub fn init(directive: &str) {
    let (filter, rejected) = build_filter(directive);

    #[cfg(target_arch = "wasm32")]
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(console::ConsoleWriter)
        .without_time()
        .with_ansi(false)
        .with_target(false);

    #[cfg(not(target_arch = "wasm32"))]
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
    if let Some(e) = rejected {
        tracing::warn!(directive, error = %e, fallback = FALLBACK_FILTER, "invalid log filter");
    }
}

#[cfg(target_arch = "wasm32")]
mod console {
    use std::io::{self, Write};
    use tracing_subscriber::fmt::MakeWriter;
    use wasm_bindgen::JsValue;

    /// Hands out one buffer per event; the buffer is sent to
    /// `console.log` as a single string when the event is done.
    #[derive(Clone, Copy)]
    pub struct ConsoleWriter;

    pub struct ConsoleLine {
        buffer: Vec<u8>,
    }

    impl<'a> MakeWriter<'a> for ConsoleWriter {
        type Writer = ConsoleLine;

        fn make_writer(&'a self) -> Self::Writer {
            ConsoleLine { buffer: Vec::new() }
        }
    }

    impl Write for ConsoleLine {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for ConsoleLine {
        fn drop(&mut self) {
            let line = String::from_utf8_lossy(&self.buffer);
            let line = line.trim_end();
            if !line.is_empty() {
                web_sys::console::log_1(&JsValue::from_str(line));
            }
        }
    }
}
