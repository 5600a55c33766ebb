use crate::value::Value;
use core::fmt;

/// Identifies a stored row within its table.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RowKey(pub u64);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The value shared by every unset slot.
static NULL: Value = Value::Null;

/// A fixed-width vector of values; the unit of storage mutation.
///
/// A slot may be unset (`None`), which is distinct from holding NULL:
/// unset slots are filled in by defaults, sequences, or computed columns
/// before the row reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    /// Assigned by the storage engine on insert.
    pub key: Option<RowKey>,
    values: Vec<Option<Value>>,
}

impl Row {
    /// Returns a row of `width` unset slots.
    pub fn template(width: usize) -> Self {
        Self {
            key: None,
            values: vec![None; width],
        }
    }

    /// Returns a row of `width` NULLs.
    pub fn nulls(width: usize) -> Self {
        Self {
            key: None,
            values: vec![Some(Value::Null); width],
        }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Returns the value at `idx`, reading an unset slot as NULL.
    pub fn value(&self, idx: usize) -> &Value {
        self.values[idx].as_ref().unwrap_or(&NULL)
    }

    /// Returns the value at `idx`, or `None` if the slot is unset.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values[idx].as_ref()
    }

    pub fn set(&mut self, idx: usize, value: Value) {
        self.values[idx] = Some(value);
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        (0..self.width()).map(|i| self.value(i))
    }

    /// Do the two rows hold equal values, ignoring their keys?
    pub fn same_values(&self, other: &Row) -> bool {
        self.width() == other.width() && self.values().eq(other.values())
    }
}

impl<V: Into<Value>> FromIterator<V> for Row {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            key: None,
            values: iter.into_iter().map(|v| Some(v.into())).collect(),
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("( ")?;
        for (i, v) in self.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&v.sql())?;
        }
        f.write_str(" )")
    }
}

/// A partially-filled row used as a search key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchRow {
    values: Vec<Option<Value>>,
}

impl SearchRow {
    pub fn template(width: usize) -> Self {
        Self {
            values: vec![None; width],
        }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values[idx].as_ref()
    }

    pub fn set(&mut self, idx: usize, value: Value) {
        self.values[idx] = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_reads_as_null() {
        let mut row = Row::template(2);
        row.set(1, Value::Int(5));
        assert_eq!(row.get(0), None);
        assert_eq!(row.value(0), &Value::Null);
        assert_eq!(row.value(1), &Value::Int(5));
    }

    #[test]
    fn display_renders_literals() {
        let row: Row = [Value::Int(1), Value::from("a")].into_iter().collect();
        assert_eq!(row.to_string(), "( 1, 'a' )");
    }

    #[test]
    fn same_values_ignores_key() {
        let a: Row = [1, 2].into_iter().collect();
        let mut b = a.clone();
        b.key = Some(RowKey(9));
        assert!(a.same_values(&b));
        assert_ne!(a, b);
    }
}
