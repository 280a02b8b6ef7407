//! capabilities for reading time and fresh counter values.
//!
//! readers never touch `std::fs` or `Instant::now()` directly. they hold one of the handles
//! defined here, which lets tests substitute canned content and virtual time.

use {
    crate::error::Error,
    std::{
        fs::File,
        io::{Read, Seek, SeekFrom},
        path::{Path, PathBuf},
        time::Instant,
    },
};

#[cfg(test)]
use std::{
    cell::Cell,
    collections::VecDeque,
    rc::Rc,
    time::Duration,
};

pub use self::{clock::*, counter::*, fresh::*};

mod clock {
    use super::*;

    /// a source of monotonic time.
    pub trait Clock {
        fn now(&self) -> Instant;
    }

    /// something that can block until a deadline.
    pub trait Sleep {
        fn sleep_until(&self, deadline: Instant);
    }

    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> Instant {
            Instant::now()
        }
    }

    impl Sleep for SystemClock {
        fn sleep_until(&self, deadline: Instant) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
        }
    }

    /// a virtual clock. sleeping advances time instantly.
    #[cfg(test)]
    #[derive(Clone, Debug)]
    pub struct MockClock {
        now: Rc<Cell<Instant>>,
    }

    #[cfg(test)]
    impl MockClock {
        pub fn new() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
            }
        }

        pub fn advance(&self, by: Duration) {
            let Self { now } = self;
            now.set(now.get() + by);
        }
    }

    #[cfg(test)]
    impl Clock for MockClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    #[cfg(test)]
    impl Sleep for MockClock {
        fn sleep_until(&self, deadline: Instant) {
            let Self { now } = self;
            if deadline > now.get() {
                now.set(deadline);
            }
        }
    }
}

/// sources whose whole content must be reread on every sample.
mod fresh {
    use super::*;

    /// a source of text that always presents its current value from the start.
    pub trait Fresh {
        /// the path this source reads, used in diagnostics.
        fn path(&self) -> &Path;

        /// returns the current content of this source.
        fn fresh(&mut self) -> Result<&str, Error>;
    }

    /// a persistently open pseudo-file, seeked back to offset 0 before every read.
    #[derive(Debug)]
    pub struct Reread {
        path: PathBuf,
        file: File,
        buf: String,
    }

    // === impl Reread ===

    impl Reread {
        /// opens `path`, failing if it does not exist.
        pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
            let path = path.into();
            let file = File::open(&path).map_err(Error::unavailable(&path))?;

            Ok(Self {
                path,
                file,
                buf: String::with_capacity(64),
            })
        }
    }

    impl Fresh for Reread {
        fn path(&self) -> &Path {
            &self.path
        }

        fn fresh(&mut self) -> Result<&str, Error> {
            let Self { path, file, buf } = self;

            buf.clear();
            file.seek(SeekFrom::Start(0))
                .and_then(|_| file.read_to_string(buf))
                .map_err(Error::read(path.as_path()))?;

            Ok(buf.as_str())
        }
    }

    /// a mock source that replays queued content, one entry per sample.
    #[cfg(test)]
    #[derive(Debug)]
    pub struct MockFresh {
        path: PathBuf,
        queue: VecDeque<String>,
        current: String,
    }

    #[cfg(test)]
    impl MockFresh {
        pub fn new<I, S>(path: &str, contents: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                path: PathBuf::from(path),
                queue: contents.into_iter().map(Into::into).collect(),
                current: String::new(),
            }
        }
    }

    #[cfg(test)]
    impl Fresh for MockFresh {
        fn path(&self) -> &Path {
            &self.path
        }

        fn fresh(&mut self) -> Result<&str, Error> {
            let Self {
                path,
                queue,
                current,
            } = self;

            *current = queue.pop_front().ok_or_else(|| Error::ReadFailure {
                path: path.clone(),
                source: std::io::ErrorKind::UnexpectedEof.into(),
            })?;

            Ok(current.as_str())
        }
    }
}

/// numeric counters.
mod counter {
    use super::*;

    /// a counter that reports the activity accumulated since its previous read.
    ///
    /// implementations that are cumulative in the kernel must reset themselves (or difference
    /// internally) so that callers only ever see the per-interval amount.
    pub trait Counter {
        fn take(&mut self) -> Result<u64, Error>;
    }

    /// a mock counter that replays queued counts.
    #[cfg(test)]
    #[derive(Debug, Default)]
    pub struct MockCounter {
        counts: VecDeque<u64>,
    }

    #[cfg(test)]
    impl MockCounter {
        pub fn new(counts: impl IntoIterator<Item = u64>) -> Self {
            Self {
                counts: counts.into_iter().collect(),
            }
        }
    }

    #[cfg(test)]
    impl Counter for MockCounter {
        fn take(&mut self) -> Result<u64, Error> {
            let MockCounter { counts } = self;

            Ok(counts.pop_front().expect("mock counts should not be empty"))
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Write};

    #[test]
    fn reread_observes_rewritten_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uptime");
        std::fs::write(&path, "100.00 400.00\n").unwrap();

        let mut reread = Reread::open(&path).unwrap();
        assert_eq!(reread.fresh().unwrap(), "100.00 400.00\n");

        // rewrite in place, so the open handle sees the new bytes at offset 0.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        file.write_all(b"101.50 402.00\n").unwrap();
        drop(file);

        assert_eq!(reread.fresh().unwrap(), "101.50 402.00\n");
        assert_eq!(reread.fresh().unwrap(), "101.50 402.00\n");
    }

    #[test]
    fn reread_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Reread::open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::ResourceUnavailable { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn mock_clock_sleeps_forward_only() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.sleep_until(start + Duration::from_millis(5));
        assert_eq!(clock.now(), start + Duration::from_millis(5));
        clock.sleep_until(start);
        assert_eq!(clock.now(), start + Duration::from_millis(5));
    }
}
