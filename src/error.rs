use std::{io, path::PathBuf};

/// an error encountered while opening or sampling a counter.
///
/// each variant names the path, cpu, or key involved, so that a failure in the field can be
/// diagnosed from its message alone.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// a required pseudo-file or directory could not be opened.
    #[error("{path} is unavailable: {source}")]
    ResourceUnavailable { path: PathBuf, source: io::Error },
    /// an already-open handle could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFailure { path: PathBuf, source: io::Error },
    /// a source's content did not have the expected shape.
    #[error("failed to parse {what} from {path}: {content:?}")]
    ParseFailure {
        path: PathBuf,
        what: &'static str,
        content: String,
    },
    /// a hardware cycle counter could not be opened, read, or reset.
    #[error("perf cycle counter for cpu {cpu}: {source}")]
    Perf { cpu: u32, source: io::Error },
}

// === impl Error ===

impl Error {
    pub(crate) fn unavailable(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::ResourceUnavailable { path, source }
    }

    pub(crate) fn read(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::ReadFailure { path, source }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, what: &'static str, content: &str) -> Self {
        Self::ParseFailure {
            path: path.into(),
            what,
            content: content.trim_end().to_owned(),
        }
    }
}
