use super::multimap::MultiMap;
use crate::error::TableError;
use crate::index::{Index, IndexColumn, IndexCondition, IndexType, SortOrder, COST_ROW_OFFSET};
use crate::row::{Row, RowKey};
use crate::session::Session;
use crate::value::Value;
use crate::Result;
use itertools::Itertools as _;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_primitives::{IndexId, TableId};

/// The key of a row in a [`TreeIndex`]: the indexed values, in index order.
pub type IndexKey = SmallVec<[Value; 2]>;

/// The primary storage of a memory table, doubling as its full-scan index.
#[derive(Debug)]
pub struct ScanIndex {
    id: IndexId,
    table: TableId,
    name: Box<str>,
    rows: RwLock<BTreeMap<RowKey, Row>>,
}

impl ScanIndex {
    pub fn new(id: IndexId, table: TableId, table_name: &str) -> Self {
        Self {
            id,
            table,
            name: format!("{table_name}_DATA").into(),
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn contains(&self, key: RowKey) -> bool {
        self.rows.read().contains_key(&key)
    }

    pub fn get(&self, key: RowKey) -> Option<Row> {
        self.rows.read().get(&key).cloned()
    }

    pub(super) fn insert(&self, key: RowKey, row: Row) {
        self.rows.write().insert(key, row);
    }

    pub(super) fn remove(&self, key: RowKey) -> Option<Row> {
        self.rows.write().remove(&key)
    }

    pub(super) fn clear(&self) {
        self.rows.write().clear();
    }

    pub(super) fn snapshot(&self) -> Vec<Row> {
        self.rows.read().values().cloned().collect()
    }
}

impl Index for ScanIndex {
    fn id(&self) -> IndexId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> TableId {
        self.table
    }

    fn index_type(&self) -> &IndexType {
        &IndexType::SCAN
    }

    fn columns(&self) -> &[IndexColumn] {
        &[]
    }

    fn cost(&self, _: &dyn Session, _: Option<&[IndexCondition]>, _: Option<&SortOrder>) -> f64 {
        (self.len() as u64 + COST_ROW_OFFSET) as f64
    }

    fn can_get_first_or_last(&self) -> bool {
        false
    }

    fn find_first_or_last(&self, _: &dyn Session, _: bool) -> Result<Option<Row>> {
        Err(TableError::Unsupported(format!("first or last row of scan index `{}`", self.name)))
    }

    fn row_count(&self, _: &dyn Session) -> u64 {
        self.len() as u64
    }

    fn rows(&self, _: &dyn Session) -> Result<Vec<Row>> {
        Ok(self.snapshot())
    }

    fn create_sql(&self) -> Option<String> {
        None
    }
}

/// An ordered secondary index over the rows of a [`ScanIndex`].
#[derive(Debug)]
pub struct TreeIndex {
    id: IndexId,
    name: Box<str>,
    table_name: Box<str>,
    index_type: IndexType,
    columns: Vec<IndexColumn>,
    comment: Option<Box<str>>,
    map: RwLock<MultiMap<IndexKey, RowKey>>,
    data: Arc<ScanIndex>,
}

impl TreeIndex {
    pub fn new(
        id: IndexId,
        name: &str,
        table_name: &str,
        columns: &[IndexColumn],
        index_type: IndexType,
        comment: Option<&str>,
        data: Arc<ScanIndex>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            table_name: table_name.into(),
            index_type,
            columns: columns.to_vec(),
            comment: comment.map(Into::into),
            map: RwLock::new(MultiMap::new()),
            data,
        }
    }

    fn key_of(&self, row: &Row) -> IndexKey {
        self.columns.iter().map(|c| row.value(c.column.idx()).clone()).collect()
    }

    /// Adds `row`, stored under `key`, to the index.
    ///
    /// A unique index rejects a second row with equal values,
    /// unless one of the values is NULL.
    pub(super) fn insert(&self, row: &Row, key: RowKey) -> Result<()> {
        let index_key = self.key_of(row);
        let mut map = self.map.write();
        if self.index_type.unique && !index_key.iter().any(Value::is_null) {
            if map.insert_unique(index_key.clone(), key).is_some() {
                return Err(TableError::DuplicateKey {
                    table: self.table_name.clone(),
                    index: self.name.clone(),
                    value: format!("( {} )", index_key.iter().map(Value::sql).join(", ")),
                });
            }
        } else {
            map.insert(index_key, key);
        }
        Ok(())
    }

    pub(super) fn remove(&self, row: &Row, key: RowKey) -> bool {
        self.map.write().delete(&self.key_of(row), &key)
    }

    pub(super) fn clear(&self) {
        self.map.write().clear();
    }

    fn distinct_keys(&self) -> usize {
        self.map.read().num_keys()
    }

    /// The classic range-index estimate over `row_count` rows.
    fn cost_range_index(&self, masks: Option<&[IndexCondition]>, row_count: u64, sort: Option<&SortOrder>) -> u64 {
        let row_count = row_count + COST_ROW_OFFSET;
        let mut cost = row_count;
        let mut rows = row_count;
        let Some(masks) = masks else {
            return cost;
        };
        let mut total_selectivity = 0u64;
        for (i, column) in self.columns.iter().enumerate() {
            let mask = masks.get(column.column.idx()).copied().unwrap_or_default();
            if mask.contains(IndexCondition::EQUALITY) {
                if i == self.columns.len() - 1 && self.index_type.unique {
                    cost = 3;
                    break;
                }
                let selectivity = u64::from(self.selectivity_of(i));
                total_selectivity = 100 - ((100 - total_selectivity) * (100 - selectivity) / 100);
                let distinct_rows = (row_count * total_selectivity / 100).max(1);
                rows = (row_count / distinct_rows).max(1);
                cost = 2 + rows;
            } else if mask.contains(IndexCondition::RANGE) {
                cost = 2 + rows / 4;
                break;
            } else if mask.contains(IndexCondition::START) {
                cost = 2 + rows / 3;
                break;
            } else if mask.contains(IndexCondition::END) {
                cost = rows / 3;
                break;
            } else {
                break;
            }
        }
        if sort.is_some_and(|s| s.is_satisfied_by(&self.columns)) {
            cost = cost.saturating_sub(1);
        }
        cost
    }

    /// The percentage of distinct values in the `i`th indexed column,
    /// measured from the index itself.
    fn selectivity_of(&self, i: usize) -> u8 {
        let rows = self.data.len();
        if rows == 0 {
            return crate::column::DEFAULT_SELECTIVITY;
        }
        let distinct = if self.columns.len() == 1 {
            self.distinct_keys()
        } else {
            let map = self.map.read();
            let distinct = map.iter().map(|(k, _)| &k[i]).dedup().count();
            distinct
        };
        (distinct * 100 / rows).clamp(1, 100) as u8
    }

    /// Row keys in index order, honoring the direction of the leading column.
    fn ordered_keys(&self) -> Vec<(IndexKey, RowKey)> {
        let map = self.map.read();
        let mut keys: Vec<_> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        if self.columns.first().is_some_and(|c| c.descending) {
            keys.reverse();
        }
        keys
    }
}

impl Index for TreeIndex {
    fn id(&self) -> IndexId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> TableId {
        self.data.table
    }

    fn index_type(&self) -> &IndexType {
        &self.index_type
    }

    fn columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    fn cost(&self, _: &dyn Session, masks: Option<&[IndexCondition]>, sort: Option<&SortOrder>) -> f64 {
        self.cost_range_index(masks, self.data.len() as u64, sort) as f64
    }

    fn can_get_first_or_last(&self) -> bool {
        true
    }

    fn find_first_or_last(&self, _: &dyn Session, first: bool) -> Result<Option<Row>> {
        let keys = self.ordered_keys();
        let mut candidates: Box<dyn Iterator<Item = &(IndexKey, RowKey)>> = if first {
            Box::new(keys.iter())
        } else {
            Box::new(keys.iter().rev())
        };
        Ok(candidates
            .find(|(k, _)| k.first().is_some_and(|v| !v.is_null()))
            .and_then(|(_, key)| self.data.get(*key)))
    }

    fn row_count(&self, _: &dyn Session) -> u64 {
        self.map.read().len() as u64
    }

    fn rows(&self, _: &dyn Session) -> Result<Vec<Row>> {
        Ok(self
            .ordered_keys()
            .into_iter()
            .filter_map(|(_, key)| self.data.get(key))
            .collect())
    }

    fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    fn create_sql(&self) -> Option<String> {
        if self.index_type.belongs_to_constraint {
            return None;
        }
        let kind = match (self.index_type.primary_key, self.index_type.unique) {
            (true, _) => "PRIMARY KEY ",
            (false, true) => "UNIQUE ",
            (false, false) => "",
        };
        // Columns are referenced by position.
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{}{}", c.column, if c.descending { " DESC" } else { "" }))
            .join(", ");
        Some(format!(
            "CREATE {kind}INDEX \"{}\" ON \"{}\"({columns})",
            self.name, self.table_name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestSession;
    use tessera_primitives::ColId;

    fn indexed(index_type: IndexType, rows: &[(i32, &str)]) -> TreeIndex {
        let data = Arc::new(ScanIndex::new(IndexId(0), TableId(1), "T"));
        let index = TreeIndex::new(IndexId(1), "IDX", "T", &[IndexColumn::asc(0u32)], index_type, None, data.clone());
        for (i, (id, name)) in rows.iter().enumerate() {
            let row: Row = [Value::Int(*id), Value::from(*name)].into_iter().collect();
            let key = RowKey(i as u64);
            index.insert(&row, key).unwrap();
            data.insert(key, row);
        }
        index
    }

    fn masks(first: IndexCondition) -> [IndexCondition; 2] {
        [first, IndexCondition::empty()]
    }

    #[test]
    fn unique_rejects_duplicates_but_not_nulls() {
        let index = indexed(IndexType::unique(), &[(1, "a")]);
        let dup: Row = [Value::Int(1), Value::from("b")].into_iter().collect();
        assert!(matches!(
            index.insert(&dup, RowKey(9)),
            Err(TableError::DuplicateKey { .. })
        ));
        let null: Row = [Value::Null, Value::from("c")].into_iter().collect();
        index.insert(&null, RowKey(10)).unwrap();
        index.insert(&null, RowKey(11)).unwrap();
    }

    #[test]
    fn cost_model() {
        let unique = indexed(IndexType::unique(), &[(1, "a"), (2, "b")]);
        assert_eq!(unique.cost_range_index(None, 2, None), 1002);
        assert_eq!(unique.cost_range_index(Some(&masks(IndexCondition::EQUALITY)), 2, None), 3);
        assert_eq!(unique.cost_range_index(Some(&masks(IndexCondition::RANGE)), 2, None), 2 + 1002 / 4);
        assert_eq!(unique.cost_range_index(Some(&masks(IndexCondition::START)), 2, None), 2 + 1002 / 3);
        assert_eq!(unique.cost_range_index(Some(&masks(IndexCondition::END)), 2, None), 1002 / 3);
        assert_eq!(unique.cost_range_index(Some(&masks(IndexCondition::empty())), 2, None), 1002);

        let sort = SortOrder::new([IndexColumn::asc(0u32)]);
        assert_eq!(unique.cost_range_index(Some(&masks(IndexCondition::END)), 2, Some(&sort)), 1002 / 3 - 1);
    }

    #[test]
    fn non_unique_equality_uses_selectivity() {
        // Two distinct values over four rows: 50% selectivity.
        let index = indexed(IndexType::non_unique(), &[(1, "a"), (1, "b"), (2, "c"), (2, "d")]);
        assert_eq!(index.selectivity_of(0), 50);
        let cost = index.cost_range_index(Some(&masks(IndexCondition::EQUALITY)), 4, None);
        // 1004 rows, 502 distinct: two rows per value.
        assert_eq!(cost, 2 + 2);
    }

    #[test]
    fn selectivity_caps_when_index_runs_ahead_of_data() {
        let index = indexed(IndexType::non_unique(), &[(1, "a")]);
        for (i, id) in [2, 3].into_iter().enumerate() {
            let row: Row = [Value::Int(id), Value::from("x")].into_iter().collect();
            index.insert(&row, RowKey(10 + i as u64)).unwrap();
        }
        // Three keys over one stored row.
        assert_eq!(index.selectivity_of(0), 100);
    }

    #[test]
    fn first_and_last_skip_nulls() {
        let session = TestSession::new(1);
        let index = indexed(IndexType::non_unique(), &[(3, "c"), (1, "a"), (2, "b")]);
        let null: Row = [Value::Null, Value::from("n")].into_iter().collect();
        index.insert(&null, RowKey(7)).unwrap();
        index.data.insert(RowKey(7), null);

        let first = index.find_first_or_last(&session, true).unwrap().unwrap();
        assert_eq!(first.value(0), &Value::Int(1));
        let last = index.find_first_or_last(&session, false).unwrap().unwrap();
        assert_eq!(last.value(0), &Value::Int(3));
        assert_eq!(index.column_index(ColId(0)), Some(0));
    }

    #[test]
    fn create_sql_names_kind_and_columns() {
        let index = indexed(IndexType::unique(), &[]);
        assert_eq!(index.create_sql().unwrap(), "CREATE UNIQUE INDEX \"IDX\" ON \"T\"(0)");
        let owned = indexed(IndexType::unique().for_constraint(), &[]);
        assert_eq!(owned.create_sql(), None);
    }
}
