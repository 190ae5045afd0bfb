use std::fmt;
use std::str::FromStr;

/// Subscription tier the price quote is computed for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tier {
    Tablet,
    Scroll,
    #[default]
    Opus,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tablet => "TABLET",
            Self::Scroll => "SCROLL",
            Self::Opus => "OPUS",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TABLET" => Ok(Self::Tablet),
            "SCROLL" => Ok(Self::Scroll),
            "OPUS" => Ok(Self::Opus),
            other => Err(format!("Unknown tier '{other}'.")),
        }
    }
}
