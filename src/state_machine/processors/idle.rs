//! Idle: no call. Starts lobbies, outgoing calls and incoming calls.

use super::{default, Outcome};
use crate::signaling::{self, OfferType, Opaque};
use crate::state_machine::delegates::{call_setup, failure, group};
use crate::state_machine::effect::PhoneState;
use crate::state_machine::ids::{CallId, DeviceId};
use crate::state_machine::participant::CallParticipant;
use crate::state_machine::peer::RemotePeer;
use crate::state_machine::recipient::Recipient;
use crate::state_machine::state::{CallState, Mode};
use crate::state_machine::transition::{CallContext, TransitionResult};
use crate::state_machine::{Action, Effect, ServiceState};

pub(super) fn handle(state: ServiceState, ctx: &mut CallContext<'_>, action: Action) -> Outcome {
    match action {
        Action::PreJoinCall { recipient } if recipient.is_group() => {
            group::pre_join(state, ctx, recipient)
        }
        Action::PreJoinCall { recipient } => Ok(pre_join(state, recipient)),
        Action::OutgoingCall {
            recipient,
            offer_type,
        } => Ok(call_setup::start_outgoing_call(
            state, ctx, recipient, offer_type,
        )),
        Action::ReceivedOffer {
            call_id,
            remote_device,
            sender,
            offer_type,
            payload,
        } => Ok(received_offer(
            state,
            ctx,
            call_id,
            remote_device,
            sender,
            offer_type,
            &payload,
        )),
        other => default::ignore(state, &other),
    }
}

fn pre_join(state: ServiceState, recipient: Recipient) -> TransitionResult {
    tracing::info!(recipient = %recipient.id, "entering call lobby");
    TransitionResult::new(
        state
            .builder()
            .mode(Mode::PreJoin)
            .change_call_info_state()
            .call_state(CallState::PreJoin)
            .call_recipient(recipient)
            .commit()
            .change_video_state()
            .initialize()
            .build(),
    )
}

/// Hand the offer to the engine and wait for it to ring locally.
/// The view stays Idle until the engine reports local ringing.
fn received_offer(
    state: ServiceState,
    ctx: &mut CallContext<'_>,
    call_id: CallId,
    remote_device: DeviceId,
    sender: Recipient,
    offer_type: OfferType,
    payload: &Opaque,
) -> TransitionResult {
    if let Err(e) = signaling::validate_payload("offer", call_id, payload) {
        tracing::warn!(error = %e, "dropping offer");
        return TransitionResult::new(state);
    }

    if let Err(e) = ctx
        .engine
        .received_offer(call_id, remote_device, offer_type, payload)
    {
        return failure::call_failure(state, ctx, "received_offer", &e);
    }
    tracing::info!(%call_id, from = %sender.id, device = %remote_device, ?offer_type, "incoming call");

    let next = state
        .builder()
        .mode(Mode::Incoming)
        .change_call_info_state()
        .call_recipient(sender.clone())
        .active_peer(RemotePeer::answering(sender.clone(), call_id, remote_device))
        .clear_participants()
        .put_participant(CallParticipant::create_remote(sender, false))
        .commit()
        .change_call_setup_state()
        .remote_video_offer(offer_type.is_video())
        .commit()
        .change_video_state()
        .initialize()
        .build();

    TransitionResult::new(next).with_effect(Effect::phone(PhoneState::Processing))
}
