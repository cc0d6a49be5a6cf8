/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ActionSetId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ActionId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ActionType {
    BooleanInput,
    FloatInput,
    PoseInput,
}

/// Binds an action to an input path such as `/user/hand/left/input/select/click`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SuggestedBinding {
    pub action: ActionId,
    pub binding: String,
}

impl SuggestedBinding {
    pub fn new(action: ActionId, binding: &str) -> Self {
        SuggestedBinding {
            action,
            binding: binding.into(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ActionStateBoolean {
    pub current_state: bool,
    pub changed_since_last_sync: bool,
    pub is_active: bool,
}
