use {
    super::Roots,
    crate::{
        calc::KibiBytes,
        error::Error,
        source::{Fresh, Reread},
    },
    std::path::Path,
};

/// reads total and available memory from `/proc/meminfo`.
#[derive(Debug)]
pub struct MemoryReader<F = Reread> {
    source: F,
}

const TOTAL: &str = "MemTotal";
const AVAILABLE: &str = "MemAvailable";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemorySample {
    pub total: KibiBytes,
    pub available: KibiBytes,
}

// === impl MemoryReader ===

impl MemoryReader {
    pub fn open(roots: &Roots) -> Result<Self, Error> {
        Reread::open(roots.proc("meminfo")).map(Self::new)
    }
}

impl<F: Fresh> MemoryReader<F> {
    pub fn new(source: F) -> Self {
        Self { source }
    }

    /// takes one bulk read of the table, so that the kernel cannot update it mid-parse.
    pub fn sample(&mut self) -> Result<MemorySample, Error> {
        let Self { source } = self;
        let path = source.path().to_owned();
        let text = source.fresh()?;

        Self::parse(&path, text)
    }

    fn parse(path: &Path, text: &str) -> Result<MemorySample, Error> {
        let (mut total, mut available) = (None, None);

        for line in text.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let (key, slot) = match key.trim() {
                TOTAL => (TOTAL, &mut total),
                AVAILABLE => (AVAILABLE, &mut available),
                _ => continue,
            };
            *slot = Some(Self::parse_kb(path, key, rest)?);

            if total.is_some() && available.is_some() {
                break;
            }
        }

        let missing = |key| Error::parse(path, key, text);
        Ok(MemorySample {
            total: total.ok_or_else(|| missing(TOTAL))?,
            available: available.ok_or_else(|| missing(AVAILABLE))?,
        })
    }

    /// parses a `<number> kB` value.
    fn parse_kb(path: &Path, key: &'static str, rest: &str) -> Result<KibiBytes, Error> {
        match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [value, "kB"] => value
                .parse()
                .map(KibiBytes)
                .map_err(|_| Error::parse(path, key, rest)),
            _ => Err(Error::parse(path, key, rest)),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::calc::Memory, crate::source::MockFresh};

    const MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         1024000 kB
MemAvailable:    8192000 kB
Buffers:          204800 kB
Cached:          4096000 kB
";

    #[test]
    fn synthetic_block() {
        let text = "MemTotal:  16384000 kB\nMemAvailable: 8192000 kB\n";
        let source = MockFresh::new("/proc/meminfo", [text]);
        let sample = MemoryReader::new(source).sample().unwrap();
        assert_eq!(sample.total.bytes(), 16_384_000 * 1024);
        assert_eq!(sample.available.bytes(), 8_192_000 * 1024);

        let memory = Memory::new(sample.total, sample.available);
        assert_eq!(memory.used_bytes, (16_384_000 - 8_192_000) * 1024);
    }

    #[test]
    fn skips_other_keys() {
        let source = MockFresh::new("/proc/meminfo", [MEMINFO]);
        let sample = MemoryReader::new(source).sample().unwrap();
        assert_eq!(
            sample,
            MemorySample {
                total: KibiBytes(16_384_000),
                available: KibiBytes(8_192_000),
            }
        );
    }

    #[test]
    fn stops_once_both_keys_are_found() {
        // the garbage after both keys is never looked at.
        let text = format!("{MEMINFO}MemTotal: garbage\n");
        let source = MockFresh::new("/proc/meminfo", [text]);
        assert!(MemoryReader::new(source).sample().is_ok());
    }

    #[test]
    fn missing_key_is_named() {
        let source = MockFresh::new("/proc/meminfo", ["MemTotal: 1 kB\n"]);
        let err = MemoryReader::new(source).sample().unwrap_err();
        assert!(matches!(err, Error::ParseFailure { what: "MemAvailable", .. }));
    }

    #[test]
    fn bad_unit_is_a_parse_failure() {
        let source = MockFresh::new("/proc/meminfo", ["MemTotal: 1 MB\nMemAvailable: 1 kB\n"]);
        let err = MemoryReader::new(source).sample().unwrap_err();
        assert!(matches!(err, Error::ParseFailure { what: "MemTotal", .. }));
    }
}
