use sink::error::SinkError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for handler operations.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the handler binary.
///
/// Failures while applying a batch are not errors of the binary: they are turned into the
/// failure response. These variants cover everything around it.
#[derive(Debug)]
pub enum HandlerError {
    Sink(SinkError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl HandlerError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            HandlerError::Sink(_) => "sink error",
            HandlerError::Config(_, _) => "configuration error",
            HandlerError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> &Backtrace {
        match self {
            HandlerError::Sink(err) => err.backtrace(),
            HandlerError::Config(_, cb) => &cb.0,
            HandlerError::Io(_, cb) => &cb.0,
        }
    }

    /// Creates a configuration error from any source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        HandlerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("sink handler failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace() {
            out.push_str("backtrace:\n");
            out.push_str(&self.backtrace().to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Sink(err) => write!(f, "{err}"),
            HandlerError::Config(source, _) => write!(f, "configuration error: {source}"),
            HandlerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HandlerError::Sink(err) => err.source(),
            HandlerError::Config(source, _) => Some(source.as_ref()),
            HandlerError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<SinkError> for HandlerError {
    fn from(err: SinkError) -> Self {
        HandlerError::Sink(err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Sink(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_category_and_causes() {
        let err = HandlerError::config(std::io::Error::other("missing base.yaml"));

        let report = err.render_report();

        assert!(report.starts_with("sink handler failed\n"));
        assert!(report.contains("category: configuration error\n"));
        assert!(report.contains("error: configuration error: missing base.yaml\n"));
    }
}
