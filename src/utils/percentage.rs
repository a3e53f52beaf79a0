use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Percentage {
    pub const ZERO: Percentage = Percentage(0.);

    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || !value.is_finite() {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl FromStr for Percentage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches("%");
        let v = s.parse::<f64>()?;
        Percentage::new_opt(v).ok_or_else(|| anyhow!("Can't parse {s} into percentage"))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `whole` taken by `value`. An empty whole yields 0%.
pub fn seconds_percentage(value: u64, whole: u64) -> Percentage {
    if whole == 0 {
        return Percentage(0.);
    }
    Percentage(value as f64 / whole as f64 * 100.)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percentage() {
        assert_eq!(*"5%".parse::<Percentage>().unwrap(), 5.);
        assert_eq!(*"12.5".parse::<Percentage>().unwrap(), 12.5);
        assert!("-1".parse::<Percentage>().is_err());
    }

    #[test]
    fn test_seconds_percentage() {
        assert_eq!(*seconds_percentage(30, 120), 25.);
        assert_eq!(*seconds_percentage(30, 0), 0.);
    }
}
