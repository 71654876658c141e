//! Limit value types
//!
//! A limit remembers whether it was explicitly set, so generators can skip
//! default-valued entries when re-serialising definitions.

use serde::Serialize;

use crate::system::Error;

/// A bounded value with a build-time default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limit<T: Copy> {
    value: Option<T>,
    default: T,
}

impl<T: Copy> Limit<T> {
    pub const fn new(default: T) -> Self {
        Self {
            value: None,
            default,
        }
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn get(&self) -> T {
        match self.value {
            Some(value) => value,
            None => self.default,
        }
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }
}

/// Parse the text of an INTEGER token, applying the 'K' (x 1024) suffix.
pub fn parse_integer(text: &str) -> Result<u64, Error> {
    let (digits, multiplier) = match text.strip_suffix('K') {
        Some(digits) => (digits, 1024),
        None => (text, 1),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| Error::Validate(format!("Value '{}' is not a valid integer.", text)))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| Error::Validate(format!("Value '{}' is out of range.", text)))
}

/// A watchdog timeout is a number of milliseconds or the word "never".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WatchdogTimeout {
    Never,
    Millis(u64),
}

impl WatchdogTimeout {
    /// The value written into the configuration tree.  "never" uses the
    /// framework's reserved timeout constant.
    pub fn config_value(&self) -> i64 {
        match self {
            WatchdogTimeout::Never => -1,
            WatchdogTimeout::Millis(ms) => *ms as i64,
        }
    }
}

impl std::fmt::Display for WatchdogTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchdogTimeout::Never => write!(f, "never"),
            WatchdogTimeout::Millis(ms) => write!(f, "{}", ms),
        }
    }
}

macro_rules! keyword_enum {
    ($(#[$doc:meta])* $name:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            pub fn parse(text: &str) -> Result<Self, Error> {
                match text {
                    $($text => Ok(Self::$variant),)*
                    _ => Err(Error::Validate(format!(
                        concat!("Unknown ", stringify!($name), " '{}'."),
                        text
                    ))),
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),*
                }
            }
        }
    };
}

keyword_enum! {
    /// What the supervisor does when a process faults.
    FaultAction {
        Ignore => "ignore",
        Restart => "restart",
        RestartApp => "restartApp",
        StopApp => "stopApp",
        Reboot => "reboot",
    }
}

keyword_enum! {
    /// What the supervisor does when a watchdog expires.
    WatchdogAction {
        Ignore => "ignore",
        Restart => "restart",
        Stop => "stop",
        RestartApp => "restartApp",
        StopApp => "stopApp",
        Reboot => "reboot",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_reports_set_state() {
        let mut limit = Limit::new(100u64);
        assert!(!limit.is_set());
        assert_eq!(limit.get(), 100);
        limit.set(5);
        assert!(limit.is_set());
        assert_eq!(limit.get(), 5);
    }

    #[test]
    fn integer_k_suffix_multiplies() {
        assert_eq!(parse_integer("128K").unwrap(), 128 * 1024);
        assert_eq!(parse_integer("42").unwrap(), 42);
        assert!(parse_integer("12x").is_err());
    }

    #[test]
    fn actions_round_trip() {
        assert_eq!(FaultAction::parse("restartApp").unwrap().as_str(), "restartApp");
        assert!(FaultAction::parse("stop").is_err());
        assert_eq!(WatchdogAction::parse("stop").unwrap(), WatchdogAction::Stop);
        assert!(WatchdogAction::parse("explode").is_err());
    }
}
