//! Session boundary seen by actions
//!
//! Actions never own the session. They read identity and consent flags
//! from it, and post their own diagnostic events back through it.

use tally_protocol::{Event, PropertyValue};

/// Identity values of the session an event belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    pub machine_id: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionIdentity {
    pub fn new(
        machine_id: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// The session owning a processor
///
/// `post_event` must not process the event synchronously: it is called from
/// inside the action chain, which is not re-entrant.
pub trait Session: Send + Sync {
    fn identity(&self) -> &SessionIdentity;

    /// Whether the user consented to full telemetry
    fn is_opted_in(&self) -> bool;

    /// Whether raw PII may travel alongside its hash
    fn can_collect_pii(&self) -> bool;

    /// Queue an event for later processing
    fn post_event(&self, event: Event);

    /// Queue an event named `name` carrying the single property `name = value`
    ///
    /// # Errors
    ///
    /// Rejects empty and reserved names before anything is queued.
    fn post_property(&self, name: &str, value: PropertyValue) -> tally_protocol::Result<()> {
        let mut event = Event::try_new(name)?;
        event.set_property(name, value)?;
        self.post_event(event);
        Ok(())
    }
}
