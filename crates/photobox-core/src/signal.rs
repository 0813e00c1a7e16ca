//! Hardware interrupt signals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A notification raised by a physical input line.
///
/// Produced in interrupt context, consumed exactly once by the hub's
/// poll loop and broadcast as the event of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterruptSignal {
    /// The shutter button was pressed
    ButtonPressed,

    /// The settings button was pressed
    Settings,
}

impl InterruptSignal {
    /// Returns the wire name of the event this signal becomes.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ButtonPressed => "buttonPressed",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for InterruptSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_event_names() {
        assert_eq!(InterruptSignal::ButtonPressed.event_name(), "buttonPressed");
        assert_eq!(InterruptSignal::Settings.to_string(), "settings");
    }
}
