use core::cmp::Ordering;

/// How text values are compared.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Collation {
    /// Compare by code point.
    #[default]
    Binary,
    /// Compare ASCII case-insensitively.
    /// Strings that differ only in ASCII case are equal.
    IgnoreCase,
}

/// The value-comparison mode of a table.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompareMode {
    pub collation: Collation,
}

impl CompareMode {
    pub const fn new(collation: Collation) -> Self {
        Self { collation }
    }

    pub fn compare_str(&self, a: &str, b: &str) -> Ordering {
        match self.collation {
            Collation::Binary => a.cmp(b),
            Collation::IgnoreCase => a
                .bytes()
                .map(|c| c.to_ascii_lowercase())
                .cmp(b.bytes().map(|c| c.to_ascii_lowercase())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_case_orders_case_insensitively() {
        let mode = CompareMode::new(Collation::IgnoreCase);
        assert_eq!(mode.compare_str("Apple", "apple"), Ordering::Equal);
        assert_eq!(mode.compare_str("APPLE", "apple"), Ordering::Equal);
        assert_eq!(mode.compare_str("apple", "Banana"), Ordering::Less);
        assert_eq!(CompareMode::default().compare_str("apple", "Banana"), Ordering::Greater);
    }
}
