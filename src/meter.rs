use {
    crate::calc::Level,
    serde::Deserialize,
    std::{
        fmt::{self, Write},
        iter::{once, repeat, repeat_n},
    },
};

const BORDER_L: char = '[';
const BORDER_R: char = ']';

/// the ordered set of glyphs that levels are drawn with.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Glyphs {
    /// `_-^`, which any terminal can draw.
    #[default]
    Ascii,
    /// eighth-height block elements.
    Blocks,
}

/// a labelled bar, filled `value` cells out of `width`.
pub struct Meter<'a> {
    pub name: &'a str,
    pub value: usize,
    pub width: usize,
    pub glyphs: Glyphs,
}

// === impl Glyphs ===

impl Glyphs {
    const ASCII: &'static [char] = &['_', '-', '^'];
    const BLOCKS: &'static [char] = &['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

    fn set(self) -> &'static [char] {
        match self {
            Self::Ascii => Self::ASCII,
            Self::Blocks => Self::BLOCKS,
        }
    }

    /// the number of distinct levels this set can show.
    pub fn count(self) -> usize {
        self.set().len()
    }

    pub fn glyph(self, level: Level) -> char {
        let set = self.set();
        set[level.index().min(set.len() - 1)]
    }

    /// the glyph used to fill a [`Meter`].
    fn fill(self) -> char {
        match self {
            Self::Ascii => '#',
            Self::Blocks => '█',
        }
    }

    /// draws one glyph per level, between borders.
    pub fn row(self, levels: impl IntoIterator<Item = Level>, f: &mut impl Write) -> fmt::Result {
        let glyphs = levels.into_iter().map(|level| self.glyph(level));
        let row = once(BORDER_L).chain(glyphs).chain(once(BORDER_R));
        row.map(|c| f.write_char(c)).collect()
    }
}

// === impl Meter ===

impl Meter<'_> {
    pub fn draw(&self, f: &mut impl Write) -> fmt::Result {
        const EMPTY: char = ' ';

        let Self {
            name,
            value,
            width,
            glyphs,
        } = *self;
        let value = value.min(width);

        // print the label.
        write!(f, "{name}: ")?;

        // print the meter.
        let meter = {
            let active = repeat_n(glyphs.fill(), value);
            let idle = repeat(EMPTY);
            active.chain(idle).take(width)
        };
        once(BORDER_L)
            .chain(meter)
            .chain(once(BORDER_R))
            .map(|c| f.write_char(c))
            .collect()
    }
}
