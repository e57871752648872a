//! Operating modes of the Gaia CLI.

use std::fmt;

/// The two mutually exclusive operating modes, plus the ambiguous state.
///
/// A session never assumes a mode: `Unknown` is the initial value and the
/// result of any probe whose output matched neither mode's markers. The
/// only way out of `Unknown` is another successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Initial or ambiguous state; no mode-specific marker was observed.
    Unknown,

    /// The restricted, menu-driven default shell.
    Clish,

    /// The full bash shell, reached from clish via the password challenge.
    Expert,
}

impl Mode {
    /// Modes directly reachable from this one.
    ///
    /// The expert challenge can only be initiated from clish, and exiting
    /// expert always lands back in clish. From `Unknown` nothing is
    /// reachable until a probe resolves the ambiguity.
    pub fn transitions(self) -> &'static [Mode] {
        match self {
            Mode::Clish => &[Mode::Expert],
            Mode::Expert => &[Mode::Clish],
            Mode::Unknown => &[],
        }
    }

    /// Whether `target` is this mode or directly reachable from it.
    pub fn can_transition_to(self, target: Mode) -> bool {
        self == target || self.transitions().contains(&target)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Unknown => "unknown",
            Mode::Clish => "clish",
            Mode::Expert => "expert",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        assert!(Mode::Clish.can_transition_to(Mode::Expert));
        assert!(Mode::Expert.can_transition_to(Mode::Clish));
        assert!(!Mode::Unknown.can_transition_to(Mode::Clish));
        assert!(!Mode::Unknown.can_transition_to(Mode::Expert));

        // Staying put is always allowed.
        assert!(Mode::Clish.can_transition_to(Mode::Clish));
        assert!(Mode::Expert.can_transition_to(Mode::Expert));
        assert!(Mode::Unknown.can_transition_to(Mode::Unknown));
    }

    #[test]
    fn display_names() {
        assert_eq!(Mode::Clish.to_string(), "clish");
        assert_eq!(Mode::Expert.to_string(), "expert");
        assert_eq!(Mode::Unknown.to_string(), "unknown");
    }
}
