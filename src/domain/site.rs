//! Supported retailers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed set of retailers the crawler knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteName {
    Bershka,
    Canda,
    Celio,
    Hm,
    Jules,
    Nike,
    Primark,
    Pullandbear,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown site '{0}'")]
pub struct UnknownSite(pub String);

impl SiteName {
    pub const ALL: [Self; 8] = [
        Self::Bershka,
        Self::Canda,
        Self::Celio,
        Self::Hm,
        Self::Jules,
        Self::Nike,
        Self::Primark,
        Self::Pullandbear,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bershka => "bershka",
            Self::Canda => "canda",
            Self::Celio => "celio",
            Self::Hm => "hm",
            Self::Jules => "jules",
            Self::Nike => "nike",
            Self::Primark => "primark",
            Self::Pullandbear => "pullandbear",
        }
    }
}

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteName {
    type Err = UnknownSite;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|site| site.as_str() == wanted)
            .ok_or_else(|| UnknownSite(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_sites() {
        for site in SiteName::ALL {
            assert_eq!(site.as_str().parse::<SiteName>(), Ok(site));
        }
        assert_eq!(" Celio ".parse::<SiteName>(), Ok(SiteName::Celio));
    }

    #[test]
    fn test_unknown_site_is_rejected() {
        let err = "zara".parse::<SiteName>().unwrap_err();
        assert_eq!(err.to_string(), "unknown site 'zara'");
    }
}
