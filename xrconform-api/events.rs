/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// The lifecycle states a session reports through state-change events.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SessionState {
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl SessionState {
    /// States in which the application is expected to keep running its frame loop.
    pub fn is_running(self) -> bool {
        match self {
            SessionState::Ready
            | SessionState::Synchronized
            | SessionState::Visible
            | SessionState::Focused => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum EventKind {
    SessionStateChanged,
    EventsLost,
    InstanceLossPending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Event {
    SessionStateChanged(SessionState),
    /// The runtime's event queue overflowed and this many events were dropped.
    EventsLost(u32),
    InstanceLossPending,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match *self {
            Event::SessionStateChanged(..) => EventKind::SessionStateChanged,
            Event::EventsLost(..) => EventKind::EventsLost,
            Event::InstanceLossPending => EventKind::InstanceLossPending,
        }
    }
}
