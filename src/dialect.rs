//! Shell dialect: prompt patterns and output markers for the Gaia CLI.
//!
//! The dialect is an immutable configuration object injected into a
//! [`Session`](crate::Session) at construction. All prompt recognition,
//! mode probing, and success/failure classification flows through it, so
//! device-specific variations can be swapped without touching the
//! session control flow.

use std::time::Duration;

use regex::bytes::Regex;

/// Prompt patterns, probe commands, and output markers for one CLI dialect.
///
/// The default dialect targets Check Point Gaia: a clish prompt like
/// `gw-123456>` and an expert prompt like `[Expert@gw-123456:0]#`.
#[derive(Debug, Clone)]
pub struct ShellDialect {
    /// Pattern matching the restricted (clish) prompt.
    pub clish_prompt: Regex,

    /// Pattern matching the privileged (expert) prompt.
    pub expert_prompt: Regex,

    /// Harmless command that behaves differently in each mode.
    ///
    /// In clish, `bash` is rejected with an "invalid command" message; in
    /// expert mode it is accepted and the expert prompt reappears.
    pub probe_command: String,

    /// Lowercase marker identifying the clish rejection of the probe.
    pub invalid_marker: String,

    /// Lowercase fragment distinctive of the expert prompt.
    ///
    /// Used for mode detection inside free-form output, where the full
    /// anchored prompt pattern cannot apply.
    pub expert_marker: String,

    /// Command that starts the expert mode password challenge.
    pub expert_trigger: String,

    /// Lowercase marker identifying the password challenge text.
    pub challenge_marker: String,

    /// Lowercase marker shown when no expert password is configured yet.
    ///
    /// Distinguishing this from the regular challenge is load-bearing for
    /// password provisioning built on top of the session.
    pub secret_missing_marker: String,

    /// Command that leaves expert mode back to clish.
    pub exit_command: String,

    /// Lowercase substrings that classify command output as a failure.
    ///
    /// This is a heuristic: output that legitimately contains one of these
    /// words (say, an object named `denied_error`) is misclassified as a
    /// failure. Callers needing certainty must inspect the raw output.
    pub error_markers: Vec<String>,

    /// Interval of silence treated as "the response has finished".
    pub quiet_period: Duration,

    /// How long to wait for the unsolicited login banner after connect.
    pub banner_timeout: Duration,

    /// Timeout for a single mode probe exchange.
    pub probe_timeout: Duration,

    /// Timeout for the expert password challenge to appear.
    pub challenge_timeout: Duration,

    /// How many trailing bytes of output to search for prompts.
    pub search_depth: usize,
}

impl ShellDialect {
    /// The Check Point Gaia dialect.
    pub fn gaia() -> Self {
        Self {
            clish_prompt: Regex::new(r"(?m)^[\w.\-]+>\s*$").unwrap(),
            expert_prompt: Regex::new(r"(?m)^\[Expert@[^\]]+\]#\s*$").unwrap(),
            probe_command: "bash".to_string(),
            invalid_marker: "invalid command".to_string(),
            expert_marker: "[expert@".to_string(),
            expert_trigger: "expert".to_string(),
            challenge_marker: "password".to_string(),
            secret_missing_marker: "expert password has not been defined".to_string(),
            exit_command: "exit".to_string(),
            error_markers: vec![
                "error".to_string(),
                "failed".to_string(),
                "invalid".to_string(),
                "not found".to_string(),
                "permission denied".to_string(),
                "clinfr".to_string(),
            ],
            quiet_period: Duration::from_millis(500),
            banner_timeout: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(3),
            challenge_timeout: Duration::from_secs(3),
            search_depth: 1000,
        }
    }

    /// Override the clish prompt pattern.
    pub fn with_clish_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.clish_prompt = Regex::new(pattern)?;
        Ok(self)
    }

    /// Override the expert prompt pattern.
    pub fn with_expert_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.expert_prompt = Regex::new(pattern)?;
        Ok(self)
    }

    /// Add a failure marker (stored lowercase).
    pub fn with_error_marker(mut self, marker: impl Into<String>) -> Self {
        self.error_markers.push(marker.into().to_lowercase());
        self
    }

    /// Override the quiet period used to detect end-of-response.
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Override the banner, probe, and challenge timeouts at once.
    pub fn with_exchange_timeouts(mut self, timeout: Duration) -> Self {
        self.banner_timeout = timeout;
        self.probe_timeout = timeout;
        self.challenge_timeout = timeout;
        self
    }

    /// Build a combined pattern matching either mode's prompt.
    pub fn prompt_pattern(&self) -> Regex {
        let combined = format!(
            "(?:{})|(?:{})",
            self.clish_prompt.as_str(),
            self.expert_prompt.as_str()
        );
        Regex::new(&combined).unwrap_or_else(|_| Regex::new(r"(?m)^[$#>]\s*$").unwrap())
    }

    /// Find the first failure marker contained in `output` (lowercased).
    pub fn find_error_marker(&self, output: &str) -> Option<&str> {
        let lower = output.to_lowercase();
        self.error_markers
            .iter()
            .find(|m| lower.contains(m.as_str()))
            .map(String::as_str)
    }
}

impl Default for ShellDialect {
    fn default() -> Self {
        Self::gaia()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clish_prompt_matches() {
        let dialect = ShellDialect::gaia();
        assert!(dialect.clish_prompt.is_match(b"gw-123456> "));
        assert!(dialect.clish_prompt.is_match(b"some output\r\ngw-1>"));
        assert!(!dialect.clish_prompt.is_match(b"[Expert@gw-123456:0]# "));
    }

    #[test]
    fn expert_prompt_matches() {
        let dialect = ShellDialect::gaia();
        assert!(dialect.expert_prompt.is_match(b"[Expert@gw-123456:0]# "));
        assert!(dialect.expert_prompt.is_match(b"output\r\n[Expert@fw:1]#"));
        assert!(!dialect.expert_prompt.is_match(b"gw-123456> "));
    }

    #[test]
    fn combined_pattern_matches_both() {
        let pattern = ShellDialect::gaia().prompt_pattern();
        assert!(pattern.is_match(b"gw-1> "));
        assert!(pattern.is_match(b"[Expert@gw-1:0]# "));
        assert!(!pattern.is_match(b"mid-output line\r\n"));
    }

    #[test]
    fn error_markers_are_case_insensitive() {
        let dialect = ShellDialect::gaia();
        assert_eq!(
            dialect.find_error_marker("CLINFR0329  Invalid command"),
            Some("invalid")
        );
        assert_eq!(dialect.find_error_marker("CLINFR0771 Config lock"), Some("clinfr"));
        assert_eq!(dialect.find_error_marker("Permission Denied."), Some("permission denied"));
        assert_eq!(dialect.find_error_marker("OK\nsaved"), None);
    }

    #[test]
    fn custom_prompt_pattern() {
        let dialect = ShellDialect::gaia()
            .with_clish_prompt(r"(?m)^lab>\s*$")
            .unwrap();
        assert!(dialect.clish_prompt.is_match(b"lab> "));
        assert!(!dialect.clish_prompt.is_match(b"gw-1> "));
    }
}
