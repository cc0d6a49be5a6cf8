/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::pipeline::TimingFailure;

use xrconform_api::Error;
use xrconform_api::GraphicsError;
use xrconform_api::HandleError;
use xrconform_api::SessionState;

use std::time::Duration;

/// Why a conformance case stopped.
///
/// Runtime result codes a case expected are not errors; they are compared
/// and recorded. These are the outcomes that end a case early.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("{call} failed: {source}")]
    Runtime {
        call: &'static str,
        #[source]
        source: Error,
    },

    #[error("{call} returned {actual}, expected {expected}")]
    UnexpectedResult {
        call: &'static str,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error(transparent)]
    Graphics(GraphicsError),

    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout {
        what: &'static str,
        timeout: Duration,
    },

    #[error("unexpected session state {0:?}")]
    UnexpectedSessionState(SessionState),

    #[error(transparent)]
    TimingTolerance(#[from] TimingFailure),

    #[error("User failed the interactive test")]
    UserFailed,

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    #[error("graphics API {0:?} is not supported")]
    UnsupportedGraphicsApi(String),

    #[error("invalid value {value:?} for {name}")]
    InvalidOption { name: &'static str, value: String },

    #[error("{count} layers submitted, at most {max} are guaranteed to be supported")]
    TooManyLayers { count: usize, max: usize },

    #[error("{0} check(s) failed")]
    ChecksFailed(usize),
}

impl From<GraphicsError> for HarnessError {
    fn from(error: GraphicsError) -> Self {
        match error {
            GraphicsError::Handle(handle) => HarnessError::Handle(handle),
            other => HarnessError::Graphics(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Attaches the name of the runtime call to its failure code.
pub(crate) trait RuntimeResultExt<T> {
    fn call(self, call: &'static str) -> Result<T>;
}

impl<T> RuntimeResultExt<T> for std::result::Result<T, Error> {
    fn call(self, call: &'static str) -> Result<T> {
        self.map_err(|source| HarnessError::Runtime { call, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_failures_name_the_call() {
        let failed: std::result::Result<(), Error> = Err(Error::CallOrderInvalid);
        let error = failed.call("xrBeginFrame").unwrap_err();
        assert_eq!(error.to_string(), "xrBeginFrame failed: call order invalid");
    }

    #[test]
    fn stale_graphics_handles_surface_as_handle_errors() {
        let error = HarnessError::from(GraphicsError::Handle(HandleError::Null));
        match error {
            HarnessError::Handle(HandleError::Null) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
