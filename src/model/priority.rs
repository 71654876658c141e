//! Thread/process priority levels

use regex::Regex;
use serde::Serialize;

use crate::system::Error;

pub const IDLE: i32 = -3;
pub const LOW: i32 = -2;
pub const MEDIUM: i32 = -1;
pub const HIGH: i32 = 0;

/// A priority level: one of the named levels, or a real-time level rt1..rt32.
///
/// Keeps the original spelling for the configuration tree alongside the
/// numeric level used for comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Priority {
    value: Option<(String, i32)>,
}

impl Priority {
    pub fn parse(text: &str) -> Result<Self, Error> {
        let numerical = if text.starts_with("rt") {
            let re = Regex::new(r"^rt([0-9]+)$")?;
            let captures = re.captures(text).ok_or_else(|| {
                Error::Validate(format!("Unrecognized priority level '{}'.", text))
            })?;
            let number: i32 = captures[1].parse().map_err(|_| {
                Error::Validate(format!("Unrecognized priority level '{}'.", text))
            })?;
            if !(1..=32).contains(&number) {
                return Err(Error::Validate(
                    "Real-time priority level must be between rt1 and rt32, inclusive."
                        .to_string(),
                ));
            }
            number
        } else {
            match text {
                "idle" => IDLE,
                "low" => LOW,
                "medium" => MEDIUM,
                "high" => HIGH,
                _ => {
                    return Err(Error::Validate(format!(
                        "Unrecognized priority level '{}'.",
                        text
                    )));
                }
            }
        };

        Ok(Self {
            value: Some((text.to_string(), numerical)),
        })
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// The spelling as it should appear in the configuration tree.
    pub fn get(&self) -> &str {
        match &self.value {
            Some((text, _)) => text,
            None => "",
        }
    }

    pub fn numerical_value(&self) -> Option<i32> {
        self.value.as_ref().map(|(_, n)| *n)
    }

    pub fn is_real_time(&self) -> bool {
        matches!(self.value, Some((_, n)) if n > 0)
    }

    /// true iff both priorities are set and self is strictly higher.
    pub fn is_higher_than(&self, other: &Priority) -> bool {
        match (&self.value, &other.value) {
            (Some((_, a)), Some((_, b))) => a > b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_levels_order() {
        let idle = Priority::parse("idle").unwrap();
        let high = Priority::parse("high").unwrap();
        assert!(high.is_higher_than(&idle));
        assert!(!idle.is_higher_than(&high));
        assert!(!high.is_real_time());
    }

    #[test]
    fn rt_range_boundaries() {
        assert!(Priority::parse("rt1").is_ok());
        let rt32 = Priority::parse("rt32").unwrap();
        assert!(rt32.is_real_time());
        assert_eq!(rt32.numerical_value(), Some(32));

        assert!(Priority::parse("rt0").is_err());
        assert!(Priority::parse("rt33").is_err());
        assert!(Priority::parse("rtx").is_err());
    }

    #[test]
    fn unset_compares_false() {
        let unset = Priority::default();
        let high = Priority::parse("high").unwrap();
        assert!(!unset.is_higher_than(&high));
        assert!(!high.is_higher_than(&unset));
    }

    #[test]
    fn rt_beats_named() {
        let rt1 = Priority::parse("rt1").unwrap();
        let high = Priority::parse("high").unwrap();
        assert!(rt1.is_higher_than(&high));
    }
}
