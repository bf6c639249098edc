use std::fmt;

/// Dotted executable version. Fields compare in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ExeVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl ExeVersion {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Finds the first dotted number in `text`, e.g. `kmc-simulator 1.4.2`.
    /// Missing trailing fields are zero.
    pub fn parse(text: &str) -> Option<Self> {
        let start = text.find(|c: char| c.is_ascii_digit())?;
        let token: String = text[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        let mut fields = [0u32; 4];
        for (slot, part) in fields.iter_mut().zip(token.split('.')) {
            if part.is_empty() {
                break;
            }
            *slot = part.parse().ok()?;
        }
        let [major, minor, build, revision] = fields;
        Some(Self::new(major, minor, build, revision))
    }

    /// Version of this client build.
    pub fn client() -> Self {
        Self::parse(env!("CARGO_PKG_VERSION")).unwrap_or_default()
    }
}

impl fmt::Display for ExeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}
