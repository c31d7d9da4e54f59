//! Call entity

use crate::domain::call::value_object::{CallDirection, CallState};
use crate::domain::shared::value_objects::{CallId, Identity};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The call as observers see it
///
/// Only `state` ever changes, and only through [`super::CallSession`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    #[serde(skip)]
    pub(crate) id: CallId,
    #[serde(rename = "type")]
    pub(crate) direction: CallDirection,
    pub(crate) from_number: Identity,
    pub(crate) to_number: Identity,
    pub(crate) state: CallState,
    #[serde(skip)]
    pub(crate) started_at: DateTime<Utc>,
}

impl Call {
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn from_number(&self) -> &Identity {
        &self.from_number
    }

    pub fn to_number(&self) -> &Identity {
        &self.to_number
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_incoming(&self) -> bool {
        self.direction == CallDirection::Incoming
    }

    /// The identity on the other end of the call
    pub fn remote_number(&self) -> &Identity {
        match self.direction {
            CallDirection::Incoming => &self.from_number,
            CallDirection::Outgoing => &self.to_number,
        }
    }
}
