//! Audio gate flags

use serde::Serialize;

/// Inbound/outbound mute flags
///
/// Independent of the call lifecycle; the outbound source starts muted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteFlags {
    pub outbound_muted: bool,
    pub inbound_muted: bool,
}

impl Default for MuteFlags {
    fn default() -> Self {
        Self {
            outbound_muted: true,
            inbound_muted: false,
        }
    }
}
