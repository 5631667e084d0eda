/// A fatal startup failure: socket/bind/listen/socket-option errors
/// that should abort the process with a diagnostic (§7). Steady-state
/// per-session I/O errors are never represented by this type — they
/// are folded into `mark_disconnected` instead.
#[derive(Debug, thiserror::Error)]
#[error("{context}: {source}")]
pub struct IoFault {
    pub context: &'static str,
    #[source]
    pub source: std::io::Error,
}

impl IoFault {
    pub(crate) fn new(context: &'static str, source: std::io::Error) -> Self {
        Self { context, source }
    }
}
