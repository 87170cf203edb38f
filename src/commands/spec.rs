use anyhow::{Context, Result, bail};
use std::str::FromStr;

use crate::package::VersionRange;

/// A package request given on the command line: `<id>` or `<id>@<range>`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSpec {
    pub id: String,
    pub range: VersionRange,
}

impl FromStr for PackageSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (id, range) = match s.split_once('@') {
            Some((id, range)) => {
                let range = range
                    .parse()
                    .with_context(|| format!("Invalid version range in '{}'", s))?;
                (id, range)
            }
            None => (s, VersionRange::any()),
        };

        if id.is_empty() || id.contains(char::is_whitespace) {
            bail!("Invalid package '{}'. Expected <id> or <id>@<range>", s);
        }

        Ok(Self {
            id: id.to_string(),
            range,
        })
    }
}
