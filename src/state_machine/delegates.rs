//! Logic shared by several mode processors

pub(crate) mod active_call;
pub(crate) mod call_setup;
pub(crate) mod devices;
pub(crate) mod failure;
pub(crate) mod group;

use super::ids::CallId;
use super::ServiceState;

/// Whether an engine callback for `call_id` belongs to the active peer.
/// Callbacks for stale or unknown calls are logged and dropped.
pub(crate) fn is_active_call(state: &ServiceState, call_id: CallId, action: &'static str) -> bool {
    match &state.call_info.active_peer {
        Some(peer) if peer.matches(call_id) => true,
        Some(peer) => {
            tracing::warn!(
                action,
                %call_id,
                active = ?peer.call_id(),
                "ignoring action for a call that is not active"
            );
            false
        }
        None => {
            tracing::warn!(action, %call_id, "ignoring action with no active call");
            false
        }
    }
}
