//! Call recipients (people and groups) and member resolution

use super::ids::{GroupId, RecipientId};
use super::transition::TransitionError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of party a recipient is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecipientKind {
    Person {
        service_id: Uuid,
        /// Whether the person is a known contact on this device
        #[serde(default)]
        system_contact: bool,
    },
    Group {
        group_id: GroupId,
    },
}

/// A person or group that can be the target of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    #[serde(flatten)]
    pub kind: RecipientKind,
}

impl Recipient {
    pub fn person(id: RecipientId, service_id: Uuid, system_contact: bool) -> Self {
        Self {
            id,
            kind: RecipientKind::Person {
                service_id,
                system_contact,
            },
        }
    }

    pub fn group(id: RecipientId, group_id: GroupId) -> Self {
        Self {
            id,
            kind: RecipientKind::Group { group_id },
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, RecipientKind::Group { .. })
    }

    pub fn is_system_contact(&self) -> bool {
        matches!(
            self.kind,
            RecipientKind::Person {
                system_contact: true,
                ..
            }
        )
    }

    pub fn group_id(&self) -> Option<&GroupId> {
        match &self.kind {
            RecipientKind::Group { group_id } => Some(group_id),
            RecipientKind::Person { .. } => None,
        }
    }

    /// Group id of a recipient that must be a group
    pub fn require_group_id(&self) -> Result<&GroupId, TransitionError> {
        self.group_id().ok_or_else(|| {
            TransitionError::PreconditionViolated(format!(
                "recipient {} is not a group",
                self.id
            ))
        })
    }
}

/// Resolves member identifiers reported by the media engine to recipients.
///
/// Lookups must be served from local data; they run on the serialized
/// action context.
pub trait RecipientDirectory: Send + Sync {
    fn resolve(&self, service_id: Uuid) -> Recipient;
}

/// Directory that derives a stable local id from the service id itself.
///
/// Used when no contact store is attached (trace replay, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidDirectory;

impl RecipientDirectory for UuidDirectory {
    fn resolve(&self, service_id: Uuid) -> Recipient {
        let (high, _) = service_id.as_u64_pair();
        Recipient::person(RecipientId(high), service_id, false)
    }
}
