use crate::err::Error;
use std::sync::Mutex;

pub trait Io: std::fmt::Debug + Send + Sync {
    /// Report a fatal condition. The caller returns the error right after.
    fn log_exception(&self, err: &Error);
    fn log_warning(&self, msg: &str);
    fn log_info(&self, msg: &str);
}

/// Forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIo;

impl Io for TracingIo {
    fn log_exception(&self, err: &Error) {
        tracing::error!(target: "simnet", "{err}");
    }

    fn log_warning(&self, msg: &str) {
        tracing::warn!(target: "simnet", "{msg}");
    }

    fn log_info(&self, msg: &str) {
        tracing::info!(target: "simnet", "{msg}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Exception,
    Warning,
    Info,
}

/// Keeps every message; used to assert on what the network reported.
#[derive(Debug, Default)]
pub struct Recorder {
    messages: Mutex<Vec<(Level, String)>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .map(|ms| ms.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, level: Level) -> usize {
        self.messages().iter().filter(|(l, _)| *l == level).count()
    }

    fn push(&self, level: Level, msg: String) {
        if let Ok(mut ms) = self.messages.lock() {
            ms.push((level, msg));
        }
    }
}

impl Io for Recorder {
    fn log_exception(&self, err: &Error) {
        self.push(Level::Exception, err.to_string());
    }

    fn log_warning(&self, msg: &str) {
        self.push(Level::Warning, msg.to_string());
    }

    fn log_info(&self, msg: &str) {
        self.push(Level::Info, msg.to_string());
    }
}
