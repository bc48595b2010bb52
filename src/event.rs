use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::vlnv::Vlnv;

/// Where a cache mutation originated. Observers use this to decide whether a
/// notification reflects their own request or an external filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventOrigin {
    /// Mutation requested through the handler API (save, add, remove).
    #[default]
    Local,
    /// Mutation reconciled from a filesystem notification.
    External,
}

/// Change notifications emitted by the library handler.
///
/// Delivered over the `std::sync::mpsc` channel handed to
/// [`crate::library::LibraryHandler::new`]. UI-layer observers re-query the
/// handler on receipt; no document payloads cross the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LibraryEvent {
    /// A new VLNV was registered.
    Added(Vlnv, EventOrigin),
    /// The document behind a registered VLNV was replaced or re-validated.
    Updated(Vlnv, EventOrigin),
    /// A VLNV was unregistered. Carries the now-stale identity.
    Removed(Vlnv, EventOrigin),
    /// The whole cache was rebuilt; observers must discard derived state.
    Reset,
}

impl LibraryEvent {
    /// The VLNV this event is keyed by, if any.
    pub fn vlnv(&self) -> Option<&Vlnv> {
        match self {
            LibraryEvent::Added(vlnv, _)
            | LibraryEvent::Updated(vlnv, _)
            | LibraryEvent::Removed(vlnv, _) => Some(vlnv),
            LibraryEvent::Reset => None,
        }
    }

    pub fn origin(&self) -> Option<EventOrigin> {
        match self {
            LibraryEvent::Added(_, origin)
            | LibraryEvent::Updated(_, origin)
            | LibraryEvent::Removed(_, origin) => Some(*origin),
            LibraryEvent::Reset => None,
        }
    }
}

impl Display for LibraryEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            LibraryEvent::Added(vlnv, _) => write!(f, "Added({vlnv})"),
            LibraryEvent::Updated(vlnv, _) => write!(f, "Updated({vlnv})"),
            LibraryEvent::Removed(vlnv, _) => write!(f, "Removed({vlnv})"),
            LibraryEvent::Reset => write!(f, "Reset"),
        }
    }
}
