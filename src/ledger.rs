//! Per-cycle request outcome ledger
//!
//! Records which endpoints a collection cycle attempted and which failed,
//! then decides whether the cycle as a whole is fatal or a partial success.

use indexmap::{IndexMap, IndexSet};

use crate::{Error, Result};

/// Outcome record for one collection cycle
///
/// Scoped to a single cycle: the caller that starts the cycle owns it and
/// drops it afterwards.
#[derive(Debug, Default)]
pub struct OutcomeLedger {
    attempted: IndexSet<String>,
    failed: IndexMap<String, Error>,
}

impl OutcomeLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything recorded so far
    pub fn begin_cycle(&mut self) {
        self.attempted.clear();
        self.failed.clear();
    }

    /// Note that an endpoint was called this cycle
    pub fn record_attempt(&mut self, endpoint: impl Into<String>) {
        self.attempted.insert(endpoint.into());
    }

    /// Record a failed endpoint call
    ///
    /// # Errors
    ///
    /// Authentication-class errors are handed straight back instead of being
    /// recorded: they are fatal for the cycle no matter what else succeeded.
    pub fn record_failure(&mut self, endpoint: impl Into<String>, error: Error) -> Result<()> {
        if error.is_auth() {
            return Err(error);
        }

        let endpoint = endpoint.into();
        self.attempted.insert(endpoint.clone());
        self.failed.insert(endpoint, error);
        Ok(())
    }

    /// Record a successful endpoint call, superseding any earlier failure
    pub fn record_success(&mut self, endpoint: &str) {
        self.failed.shift_remove(endpoint);
    }

    /// Whether the endpoint is currently marked as failed
    #[must_use]
    pub fn is_failed(&self, endpoint: &str) -> bool {
        self.failed.contains_key(endpoint)
    }

    /// Failed endpoint keys in the order they first failed
    pub fn failed_endpoints(&self) -> impl Iterator<Item = &str> {
        self.failed.keys().map(String::as_str)
    }

    /// Number of distinct endpoints attempted
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.attempted.len()
    }

    /// Classify the cycle
    ///
    /// # Errors
    ///
    /// Returns [`Error::CycleFailed`] when at least one endpoint failed and
    /// every attempted endpoint did. Anything less is a partial success.
    pub fn evaluate(&self) -> Result<()> {
        if self.failed.is_empty() || self.failed.len() != self.attempted.len() {
            return Ok(());
        }

        let cause = self
            .failed
            .values()
            .next()
            .map_or_else(|| crate::properties::NOT_AVAILABLE.to_string(), ToString::to_string);

        Err(Error::CycleFailed {
            endpoints: self.failed.keys().cloned().collect(),
            cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(message: &str) -> Error {
        Error::Transport {
            status: Some(503),
            message: message.to_string(),
        }
    }

    #[test]
    fn empty_ledger_is_not_fatal() {
        assert!(OutcomeLedger::new().evaluate().is_ok());
    }

    #[test]
    fn two_of_three_failed_is_partial_success() {
        let mut ledger = OutcomeLedger::new();
        for endpoint in ["Profile", "Devices[a]", "Devices[b]"] {
            ledger.record_attempt(endpoint);
        }
        ledger.record_failure("Devices[a]", transport("a down")).unwrap();
        ledger.record_failure("Devices[b]", transport("b down")).unwrap();

        assert!(ledger.evaluate().is_ok());
        assert!(ledger.is_failed("Devices[a]"));
        assert!(!ledger.is_failed("Profile"));
    }

    #[test]
    fn all_failed_is_fatal_with_first_cause() {
        let mut ledger = OutcomeLedger::new();
        for endpoint in ["Profile", "Devices[a]", "Devices[b]"] {
            ledger.record_attempt(endpoint);
        }
        ledger.record_failure("Devices[b]", transport("b down")).unwrap();
        ledger.record_failure("Profile", transport("profile down")).unwrap();
        ledger.record_failure("Devices[a]", transport("a down")).unwrap();

        match ledger.evaluate() {
            Err(Error::CycleFailed { endpoints, cause }) => {
                assert_eq!(endpoints, vec!["Devices[b]", "Profile", "Devices[a]"]);
                assert!(cause.contains("b down"), "cause: {cause}");
            }
            other => panic!("expected cycle failure, got {other:?}"),
        }
    }

    #[test]
    fn success_supersedes_earlier_failure() {
        let mut ledger = OutcomeLedger::new();
        ledger.record_attempt("Profile");
        ledger.record_failure("Profile", transport("flaky")).unwrap();
        ledger.record_success("Profile");

        assert!(!ledger.is_failed("Profile"));
        assert_eq!(ledger.failed_endpoints().count(), 0);
        assert!(ledger.evaluate().is_ok());
    }

    #[test]
    fn auth_failure_escalates_without_recording() {
        let mut ledger = OutcomeLedger::new();
        ledger.record_attempt("Authentication");

        let escalated = ledger.record_failure("Authentication", Error::Auth("invalid_grant".into()));

        assert!(matches!(escalated, Err(Error::Auth(_))));
        assert!(!ledger.is_failed("Authentication"));
    }

    #[test]
    fn failure_without_attempt_still_counts_as_attempted() {
        let mut ledger = OutcomeLedger::new();
        ledger.record_attempt("Profile");
        ledger.record_failure("Devices[a]", transport("down")).unwrap();

        assert_eq!(ledger.attempted(), 2);
        assert!(ledger.evaluate().is_ok());
    }

    #[test]
    fn record_attempt_is_idempotent() {
        let mut ledger = OutcomeLedger::new();
        ledger.record_attempt("Profile");
        ledger.record_attempt("Profile");
        ledger.record_failure("Profile", transport("down")).unwrap();

        assert_eq!(ledger.attempted(), 1);
        assert!(ledger.evaluate().is_err());
    }

    #[test]
    fn begin_cycle_resets_state() {
        let mut ledger = OutcomeLedger::new();
        ledger.record_attempt("Profile");
        ledger.record_failure("Profile", transport("down")).unwrap();
        ledger.begin_cycle();

        assert_eq!(ledger.attempted(), 0);
        assert!(ledger.evaluate().is_ok());
    }
}
