/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-case results: checks, report lines and timing records.

use crate::HarnessError;
use crate::Result;

use log::info;
use log::warn;

use std::fmt::Debug;
use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// The measured averages of one pipelined frame timing run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TimingResults {
    pub test_name: String,
    pub average_wait_time: Duration,
    pub average_app_frame_time: Duration,
    pub average_display_period: Duration,
    pub average_begin_time: Duration,
    pub overhead_factor: f64,
}

/// What a conformance case found.
///
/// `check_*` records a failure and lets the case continue; `require_*`
/// additionally ends the case by returning an error.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct CaseReport {
    pub name: String,
    pub lines: Vec<String>,
    pub failures: Vec<String>,
    pub timing: Vec<TimingResults>,
}

impl CaseReport {
    pub fn new(name: &str) -> CaseReport {
        CaseReport {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn line(&mut self, line: String) {
        info!("[{}] {}", self.name, line);
        self.lines.push(line);
    }

    pub fn record_timing(&mut self, results: TimingResults) {
        self.timing.push(results);
    }

    pub fn check(&mut self, condition: bool, message: &str) -> bool {
        if !condition {
            warn!("[{}] check failed: {}", self.name, message);
            self.failures.push(message.into());
        }
        condition
    }

    pub fn check_eq<T: Debug + PartialEq>(&mut self, call: &'static str, expected: T, actual: T) -> bool {
        let equal = expected == actual;
        if !equal {
            let message = format!("{} returned {:?}, expected {:?}", call, actual, expected);
            self.check(false, &message);
        }
        equal
    }

    pub fn require(&mut self, condition: bool, message: &str) -> Result<()> {
        if self.check(condition, message) {
            Ok(())
        } else {
            Err(HarnessError::UnexpectedResult {
                call: "require",
                expected: message.into(),
                actual: "false".into(),
            })
        }
    }

    pub fn require_eq<T: Debug + PartialEq>(&mut self, call: &'static str, expected: T, actual: T) -> Result<()> {
        let (expected_text, actual_text) = (format!("{:?}", expected), format!("{:?}", actual));
        if self.check_eq(call, expected, actual) {
            Ok(())
        } else {
            Err(HarnessError::UnexpectedResult {
                call,
                expected: expected_text,
                actual: actual_text,
            })
        }
    }

    /// Turns recorded check failures into an error.
    pub fn into_result(self) -> Result<CaseReport> {
        if self.passed() {
            Ok(self)
        } else {
            Err(HarnessError::ChecksFailed(self.failures.len()))
        }
    }
}

/// Collects the reports of every case run.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Report {
    pub cases: Vec<CaseReport>,
    pub errors: Vec<(String, String)>,
}

impl Report {
    pub fn new() -> Report {
        Report::default()
    }

    /// Runs one case. Whatever the case recorded is kept, also when it
    /// stopped early with an error. Returns whether the case passed.
    pub fn run<F>(&mut self, name: &str, case_fn: F) -> bool
    where
        F: FnOnce(&mut CaseReport) -> Result<()>,
    {
        let mut case = CaseReport::new(name);
        let outcome = case_fn(&mut case);
        let passed = outcome.is_ok() && case.passed();
        if let Err(error) = outcome {
            warn!("[{}] {}", name, error);
            self.errors.push((name.into(), error.to_string()));
        }
        self.cases.push(case);
        passed
    }

    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.cases.iter().all(CaseReport::passed)
    }

    pub fn timing_results(&self) -> impl Iterator<Item = &TimingResults> {
        self.cases.iter().flat_map(|case| case.timing.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use xrconform_api::Error;

    #[test]
    fn checks_record_and_continue() {
        let mut case = CaseReport::new("checks");
        assert!(!case.check_eq("xrBeginFrame", Err::<(), _>(Error::CallOrderInvalid), Ok(())));
        assert!(case.check(true, "fine"));
        assert_eq!(case.failures.len(), 1);
        assert!(case.failures[0].contains("expected Err(CallOrderInvalid)"));
        assert!(!case.passed());
    }

    #[test]
    fn requires_end_the_case() {
        let mut case = CaseReport::new("requires");
        assert!(case.require_eq("xrWaitFrame", 1, 1).is_ok());
        match case.require_eq("xrWaitFrame", 1, 2) {
            Err(HarnessError::UnexpectedResult { expected, actual, .. }) => {
                assert_eq!(expected, "1");
                assert_eq!(actual, "2");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(case.into_result().is_err());
    }

    #[test]
    fn report_keeps_cases_that_stopped_early() {
        let mut report = Report::new();
        assert!(report.run("ok", |_| Ok(())));
        assert!(report.passed());
        assert!(!report.run("broken", |case| {
            case.line("before the failure".into());
            Err(HarnessError::UserFailed)
        }));
        assert!(!report.passed());
        assert_eq!(report.errors[0].1, "User failed the interactive test");
        assert_eq!(report.cases[1].lines, vec!["before the failure".to_string()]);
    }

    #[test]
    fn failed_checks_fail_the_report() {
        let mut report = Report::new();
        assert!(!report.run("checks", |case| {
            case.check(false, "nope");
            Ok(())
        }));
        assert!(report.errors.is_empty());
        assert!(!report.passed());
    }
}
