/// Request-scoped caller identity, taken from the `x-actor` header.
///
/// Recorded as the movement actor when the request body does not name one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    actor: Option<String>,
}

impl ActorContext {
    pub fn new(actor: Option<String>) -> Self {
        Self {
            actor: actor
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
        }
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}
