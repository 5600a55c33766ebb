use crate::error::TableError;
use crate::Result;
use parking_lot::Mutex;
use tessera_primitives::SequenceId;

/// The creation parameters of a [`Sequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDef {
    pub id: SequenceId,
    pub name: Box<str>,
    pub start: i64,
    pub increment: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub cycle: bool,
    /// Was the sequence created implicitly for an identity column?
    pub belongs_to_table: bool,
}

impl SequenceDef {
    /// An ascending identity sequence `start, start + 1, ...` up to `i64::MAX`.
    pub fn identity(id: SequenceId, name: impl Into<Box<str>>, start: i64) -> Self {
        Self {
            id,
            name: name.into(),
            start,
            increment: 1,
            min_value: start.min(1),
            max_value: i64::MAX,
            cycle: false,
            belongs_to_table: true,
        }
    }
}

#[derive(Debug)]
struct SequenceState {
    /// The next value to be handed out.
    next: i128,
    /// The last value handed out or observed.
    current: Option<i64>,
    exhausted: bool,
}

/// An identity / auto-increment generator referenced by tables for default values.
#[derive(Debug)]
pub struct Sequence {
    id: SequenceId,
    name: Box<str>,
    increment: i128,
    min_value: i128,
    max_value: i128,
    cycle: bool,
    belongs_to_table: bool,
    state: Mutex<SequenceState>,
}

impl Sequence {
    pub fn new(def: SequenceDef) -> Result<Self> {
        let SequenceDef {
            id,
            name,
            start,
            increment,
            min_value,
            max_value,
            cycle,
            belongs_to_table,
        } = def;
        if increment == 0 {
            return Err(TableError::Internal(format!("sequence `{name}`: increment must be non-zero")));
        }
        if max_value <= min_value {
            return Err(TableError::Internal(format!(
                "sequence `{name}`: max value {max_value} must be greater than min value {min_value}"
            )));
        }
        if !(min_value..=max_value).contains(&start) {
            return Err(TableError::Internal(format!(
                "sequence `{name}`: start value {start} is out of bounds [{min_value}, {max_value}]"
            )));
        }
        Ok(Self {
            id,
            name,
            increment: increment as i128,
            min_value: min_value as i128,
            max_value: max_value as i128,
            cycle,
            belongs_to_table,
            state: Mutex::new(SequenceState {
                next: start as i128,
                current: None,
                exhausted: false,
            }),
        })
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn belongs_to_table(&self) -> bool {
        self.belongs_to_table
    }

    pub fn is_cycle(&self) -> bool {
        self.cycle
    }

    /// Returns the last value handed out or observed, if any.
    pub fn current_value(&self) -> Option<i64> {
        self.state.lock().current
    }

    /// Hands out the next value.
    ///
    /// Fails with [`TableError::SequenceExhausted`] once a non-cycling sequence
    /// has passed its bound.
    pub fn next_value(&self) -> Result<i64> {
        let mut state = self.state.lock();
        if state.exhausted {
            return Err(TableError::SequenceExhausted(self.name.clone()));
        }
        let value = state.next;
        self.advance(&mut state, value);
        // `value` was validated against the `i64` bounds when it became `next`.
        Ok(value as i64)
    }

    /// Moves the sequence past `value`, which a user supplied explicitly
    /// for an identity column, so the sequence never hands it out again.
    pub fn observe(&self, value: i64) {
        let mut state = self.state.lock();
        let value = value as i128;
        let passed = if self.increment > 0 {
            value >= state.next
        } else {
            value <= state.next
        };
        if passed && (self.min_value..=self.max_value).contains(&value) {
            self.advance(&mut state, value);
        }
    }

    fn advance(&self, state: &mut SequenceState, from: i128) {
        state.current = Some(from as i64);
        let next = from + self.increment;
        if (self.min_value..=self.max_value).contains(&next) {
            state.next = next;
        } else if self.cycle {
            state.next = next_in_sequence(self.min_value, self.max_value, self.increment, from);
        } else {
            state.exhausted = true;
        }
    }
}

/// Returns the next value in the sequence given the params, wrapping around.
///
/// Examples:
/// (min: 1, max: 10, increment: 1, value: 9) -> 10
/// (min: 1, max: 10, increment: 1, value: 10) -> 1
/// (min: 1, max: 10, increment: 3, value: 9) -> 2
/// (min: 1, max: 10, increment: -3, value: 1) -> 8
fn next_in_sequence(min: i128, max: i128, increment: i128, value: i128) -> i128 {
    let mut next = value + increment;
    if increment > 0 {
        if next > max {
            next = min + (next - max - 1) % (max - min + 1);
        }
    } else if next < min {
        next = max - (min - next - 1) % (max - min + 1);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn def(start: i64, increment: i64, min: i64, max: i64, cycle: bool) -> SequenceDef {
        SequenceDef {
            id: SequenceId(1),
            name: "SEQ".into(),
            start,
            increment,
            min_value: min,
            max_value: max,
            cycle,
            belongs_to_table: false,
        }
    }

    #[test]
    fn wrap_formula() {
        assert_eq!(next_in_sequence(1, 10, 1, 9), 10);
        assert_eq!(next_in_sequence(1, 10, 1, 10), 1);
        assert_eq!(next_in_sequence(1, 10, 3, 5), 8);
        assert_eq!(next_in_sequence(1, 10, 3, 9), 2);
        assert_eq!(next_in_sequence(1, 10, -3, 4), 1);
        assert_eq!(next_in_sequence(1, 10, -3, 1), 8);
    }

    #[test]
    fn identity_counts_up() {
        let seq = Sequence::new(SequenceDef::identity(SequenceId(1), "ID_SEQ", 1)).unwrap();
        assert_eq!(seq.current_value(), None);
        assert_eq!(seq.next_value(), Ok(1));
        assert_eq!(seq.next_value(), Ok(2));
        assert_eq!(seq.current_value(), Some(2));
    }

    #[test]
    fn exhausts_without_cycle() {
        let seq = Sequence::new(def(9, 1, 1, 10, false)).unwrap();
        assert_eq!(seq.next_value(), Ok(9));
        assert_eq!(seq.next_value(), Ok(10));
        assert_eq!(seq.next_value(), Err(TableError::SequenceExhausted("SEQ".into())));
    }

    #[test]
    fn wraps_with_cycle() {
        let seq = Sequence::new(def(9, 1, 1, 10, true)).unwrap();
        let values: Vec<_> = (0..4).map(|_| seq.next_value().unwrap()).collect();
        assert_eq!(values, [9, 10, 1, 2]);
    }

    #[test]
    fn observe_skips_supplied_values() {
        let seq = Sequence::new(def(1, 1, 1, 100, false)).unwrap();
        seq.observe(5);
        assert_eq!(seq.next_value(), Ok(6));
        // Values behind the sequence don't move it.
        seq.observe(2);
        assert_eq!(seq.next_value(), Ok(7));
    }

    #[test]
    fn rejects_bad_definitions() {
        assert!(Sequence::new(def(1, 0, 1, 10, false)).is_err());
        assert!(Sequence::new(def(1, 1, 10, 1, false)).is_err());
        assert!(Sequence::new(def(20, 1, 1, 10, false)).is_err());
    }

    proptest! {
        #[test]
        fn cycling_stays_in_bounds(start in 1i64..=10, increment in prop_oneof![-9i64..=-1, 1i64..=9], n in 1usize..50) {
            let seq = Sequence::new(def(start, increment, 1, 10, true)).unwrap();
            for _ in 0..n {
                let v = seq.next_value().unwrap();
                prop_assert!((1..=10).contains(&v));
            }
        }
    }
}
