//! presents rendered frames.

use {
    crossterm::{
        ExecutableCommand, QueueableCommand, cursor,
        style::Print,
        terminal::{Clear, ClearType},
    },
    std::io::{self, Stdout, Write},
};

/// somewhere to show a frame.
pub trait Sink {
    fn present(&mut self, frame: &str) -> io::Result<()>;
}

/// a terminal, redrawn from the top-left corner for every frame.
///
/// each frame is queued behind a clear and a cursor move into one buffer, and written with a
/// single flush, so that a frame is never seen half-drawn.
#[derive(Debug)]
pub struct Terminal<W: Write = Stdout> {
    out: W,
    buf: Vec<u8>,
    cursor_hidden: bool,
}

// === impl Terminal ===

impl Terminal {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            buf: Vec::new(),
            cursor_hidden: false,
        }
    }

    /// hides the cursor until this terminal is dropped.
    pub fn hide_cursor(&mut self) -> io::Result<()> {
        self.out.execute(cursor::Hide)?;
        self.cursor_hidden = true;
        Ok(())
    }
}

impl<W: Write> Sink for Terminal<W> {
    fn present(&mut self, frame: &str) -> io::Result<()> {
        let Self { out, buf, .. } = self;

        buf.clear();
        buf.queue(Clear(ClearType::All))?
            .queue(cursor::MoveTo(0, 0))?
            .queue(Print(frame))?;

        out.write_all(buf)?;
        out.flush()
    }
}

impl<W: Write> Drop for Terminal<W> {
    fn drop(&mut self) {
        if self.cursor_hidden {
            // there is nowhere left to report a failure to.
            let _ = self.out.execute(cursor::Show);
        }
    }
}
