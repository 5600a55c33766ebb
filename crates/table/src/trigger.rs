use crate::row::Row;
use crate::session::Session;
use crate::Result;
use bitflags::bitflags;
use core::fmt;
use tessera_primitives::TriggerId;

bitflags! {
    /// The events a trigger fires on.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TriggerEvents: u8 {
        const INSERT = 1;
        const UPDATE = 2;
        const DELETE = 4;
        const SELECT = 8;
        const ROLLBACK = 16;
    }
}

impl TriggerEvents {
    /// The row event implied by which of `old` and `new` are present.
    pub fn of_row_change(old: Option<&Row>, new: Option<&Row>) -> Self {
        match (old.is_some(), new.is_some()) {
            (false, true) => Self::INSERT,
            (true, true) => Self::UPDATE,
            (true, false) => Self::DELETE,
            (false, false) => Self::empty(),
        }
    }
}

/// A user-defined callback fired around statements or row mutations.
pub trait Trigger: fmt::Debug + Send + Sync {
    fn id(&self) -> TriggerId;

    fn name(&self) -> &str;

    fn events(&self) -> TriggerEvents;

    /// Does this trigger fire before the operation? Otherwise it fires after.
    fn is_before(&self) -> bool;

    /// Does this trigger fire once per row? Otherwise once per statement.
    fn is_row_based(&self) -> bool;

    fn is_select_trigger(&self) -> bool {
        self.events().contains(TriggerEvents::SELECT)
    }

    /// Fires the statement-level hook for `events`.
    fn fire(&self, session: &dyn Session, events: TriggerEvents, before: bool) -> Result<()>;

    /// Fires the row-level hook.
    ///
    /// Returns `true` if the trigger handled the operation itself
    /// ("instead of"), in which case the default action must not run.
    fn fire_row(&self, session: &dyn Session, old: Option<&Row>, new: Option<&Row>, rollback: bool) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_change_events() {
        let row: Row = [1].into_iter().collect();
        assert_eq!(TriggerEvents::of_row_change(None, Some(&row)), TriggerEvents::INSERT);
        assert_eq!(TriggerEvents::of_row_change(Some(&row), Some(&row)), TriggerEvents::UPDATE);
        assert_eq!(TriggerEvents::of_row_change(Some(&row), None), TriggerEvents::DELETE);
    }
}
