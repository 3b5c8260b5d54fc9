//! Search executors: single-purpose adapters from a prepared search to one
//! output shape (ids, objects, field maps, pages).
//!
//! All executors share the same skeleton: run the compiled query with the
//! selects they need, then reshape the row list. Paginated variants apply
//! the page limit, then compute the absolute count separately.

use decibel_rs_core::error::{DecibelError, DecibelResult, ErrorReporter};
use indexmap::IndexMap;

use crate::executor::{QueryExecutor, Row};
use crate::instance::{ModelFactory, ModelInstance};
use crate::search::model_search::{IncludedSelect, ModelSearch};
use crate::search::select::{FieldRow, ReturnMode, SelectedValue};
use crate::value::Value;

/// One page of results with the absolute (unlimited) total.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_results: u64,
    pub page_number: u64,
    pub page_size: u64,
}

pub(crate) fn count(search: &mut ModelSearch<'_>, db: &dyn QueryExecutor) -> DecibelResult<u64> {
    search.absolute_count(db)
}

/// Selects only id (plus the key field when it differs) and returns the raw
/// id list.
pub(crate) struct IdsExecuter;

impl IdsExecuter {
    pub(crate) fn execute(
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
    ) -> DecibelResult<Vec<i64>> {
        search.prepare()?;
        let mut selects = vec![search.id_select()];
        if let Some(key) = search.key_select_sql() {
            selects.push(key);
        }
        let distinct = search.deduplicates();
        let rows = search.run(db, selects, distinct, true, true, "ids")?;
        rows.iter().map(|row| row.require_int("id")).collect()
    }
}

/// Returns the id at a fixed position, if any.
pub(crate) struct IdExecuter {
    pub index: usize,
}

impl IdExecuter {
    pub(crate) fn run(
        self,
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
    ) -> DecibelResult<Option<i64>> {
        let ids = IdsExecuter::execute(search, db)?;
        Ok(ids.get(self.index).copied())
    }
}

/// Resolves ids and hydrates an instance per id, skipping ids that no
/// longer resolve to a live row.
pub(crate) struct ObjectsExecuter;

impl ObjectsExecuter {
    pub(crate) fn execute(
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
    ) -> DecibelResult<Vec<ModelInstance>> {
        let ids = IdsExecuter::execute(search, db)?;
        let qualified_name = search.qualified_name_owned();
        let factory = search.factory();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match factory.create(&qualified_name, id) {
                Ok(instance) => out.push(instance),
                Err(DecibelError::UnknownModelInstance { .. }) => {
                    tracing::debug!(model = %qualified_name, id, "skipping deleted instance");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(out)
    }
}

/// Returns the instance at a fixed position among the live results.
pub(crate) struct ObjectExecuter {
    pub index: usize,
}

impl ObjectExecuter {
    pub(crate) fn run(
        self,
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
    ) -> DecibelResult<Option<ModelInstance>> {
        let objects = ObjectsExecuter::execute(search, db)?;
        Ok(objects.into_iter().nth(self.index))
    }
}

/// Selects every included field and reshapes rows into one [`FieldRow`] per
/// logical instance.
pub(crate) struct FieldsExecuter;

impl FieldsExecuter {
    pub(crate) fn execute(
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
    ) -> DecibelResult<Vec<FieldRow>> {
        if !search.has_includes() {
            return Err(DecibelError::InvalidMethodCall(
                "at least one field must be included before fetching field values".to_string(),
            ));
        }
        search.prepare()?;
        let mut selects = vec![search.id_select()];
        if let Some(key) = search.key_select_sql() {
            selects.push(key);
        }
        selects.extend(search.include_meta().iter().map(|meta| meta.sql.clone()));
        let rows = search.run(db, selects, false, true, true, "fields")?;
        Self::process_rows(search, &rows)
    }

    /// Combines repeated rows (from one-to-many joins) per id *before*
    /// converting values to their return shape.
    fn process_rows(search: &ModelSearch<'_>, rows: &[Row]) -> DecibelResult<Vec<FieldRow>> {
        type Grouped = IndexMap<i64, (Value, IndexMap<String, Vec<Value>>)>;
        let mut grouped: Grouped = IndexMap::new();
        for row in rows {
            let id = row.require_int("id")?;
            let entry = grouped.entry(id).or_insert_with(|| {
                let key = match search.key_field() {
                    Some("id") => Value::Int(id),
                    Some(_) => row.get("__key").cloned().unwrap_or(Value::Int(id)),
                    None => Value::Null,
                };
                (key, IndexMap::new())
            });
            for meta in search.include_meta() {
                let raw = row.get(&meta.name).cloned().unwrap_or(Value::Null);
                let values = entry.1.entry(meta.name.clone()).or_default();
                if !values.contains(&raw) {
                    values.push(raw);
                }
            }
        }
        let mut out = Vec::with_capacity(grouped.len());
        for (position, (_, (key, mut columns))) in grouped.into_iter().enumerate() {
            let key = if search.key_field().is_none() {
                Value::Int(i64::try_from(position).unwrap_or(i64::MAX))
            } else {
                key
            };
            let mut values = IndexMap::new();
            for meta in search.include_meta() {
                let mut raw_values = columns.shift_remove(&meta.name).unwrap_or_default();
                let raw = if raw_values.len() == 1 {
                    raw_values.remove(0)
                } else {
                    Value::List(raw_values)
                };
                values.insert(meta.name.clone(), convert_value(search, meta, raw));
            }
            out.push(FieldRow { key, values });
        }
        Ok(out)
    }
}

/// Converts one combined raw value to the select's return shape.
fn convert_value(search: &ModelSearch<'_>, meta: &IncludedSelect, raw: Value) -> SelectedValue {
    match meta.select.return_mode() {
        ReturnMode::Serialized => SelectedValue::Value(raw),
        ReturnMode::Text => SelectedValue::Value(Value::String(meta.field.text_value(&raw))),
        ReturnMode::Unserialized => match meta.field.link_target() {
            Some(target) => match raw {
                Value::Int(id) => match search.factory().create(target, id) {
                    Ok(instance) => SelectedValue::Instance(instance),
                    Err(_) => SelectedValue::Value(Value::Null),
                },
                Value::List(ids) => {
                    let instances = ids
                        .iter()
                        .filter_map(Value::as_int)
                        .filter_map(|id| search.factory().create(target, id).ok())
                        .collect();
                    SelectedValue::Instances(instances)
                }
                other => SelectedValue::Value(other),
            },
            None => SelectedValue::Value(meta.field.unserialize(&raw)),
        },
    }
}

/// Selects one field and returns `(key, value)` pairs.
pub(crate) struct FieldExecuter;

impl FieldExecuter {
    pub(crate) fn execute(
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
        name: &str,
    ) -> DecibelResult<Vec<(Value, SelectedValue)>> {
        search.ensure_included(name)?;
        let rows = FieldsExecuter::execute(search, db)?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                let value = row
                    .values
                    .shift_remove(name)
                    .unwrap_or(SelectedValue::Value(Value::Null));
                (row.key, value)
            })
            .collect())
    }
}

fn validate_page(page_number: u64, page_size: u64) -> DecibelResult<()> {
    if page_number == 0 || page_size == 0 {
        return Err(DecibelError::InvalidParameterValue(
            "page number and page size must be positive".to_string(),
        ));
    }
    Ok(())
}

fn build_page<T>(
    content: Vec<T>,
    total_results: u64,
    page_number: u64,
    page_size: u64,
) -> Option<Page<T>> {
    if total_results == 0 {
        return None;
    }
    Some(Page {
        content,
        total_results,
        page_number,
        page_size,
    })
}

/// Paginated wrapper over [`IdsExecuter`].
pub(crate) struct PaginatedIdsExecuter {
    pub page_number: u64,
    pub page_size: u64,
}

impl PaginatedIdsExecuter {
    pub(crate) fn run(
        self,
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
    ) -> DecibelResult<Option<Page<i64>>> {
        validate_page(self.page_number, self.page_size)?;
        search.set_limit((self.page_number - 1) * self.page_size, self.page_size);
        let content = IdsExecuter::execute(search, db)?;
        let total = search.absolute_count(db)?;
        Ok(build_page(content, total, self.page_number, self.page_size))
    }
}

/// Paginated wrapper over [`ObjectsExecuter`].
pub(crate) struct PaginatedObjectsExecuter {
    pub page_number: u64,
    pub page_size: u64,
}

impl PaginatedObjectsExecuter {
    pub(crate) fn run(
        self,
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
    ) -> DecibelResult<Option<Page<ModelInstance>>> {
        validate_page(self.page_number, self.page_size)?;
        search.set_limit((self.page_number - 1) * self.page_size, self.page_size);
        let content = ObjectsExecuter::execute(search, db)?;
        let total = search.absolute_count(db)?;
        Ok(build_page(content, total, self.page_number, self.page_size))
    }
}

/// Paginated wrapper over [`FieldsExecuter`].
pub(crate) struct PaginatedFieldsExecuter {
    pub page_number: u64,
    pub page_size: u64,
}

impl PaginatedFieldsExecuter {
    pub(crate) fn run(
        self,
        search: &mut ModelSearch<'_>,
        db: &dyn QueryExecutor,
    ) -> DecibelResult<Option<Page<FieldRow>>> {
        validate_page(self.page_number, self.page_size)?;
        search.set_limit((self.page_number - 1) * self.page_size, self.page_size);
        let content = FieldsExecuter::execute(search, db)?;
        let total = search.absolute_count(db)?;
        Ok(build_page(content, total, self.page_number, self.page_size))
    }
}

/// Lazily hydrates one instance per result id, silently skipping ids that
/// were deleted after the id query ran.
pub struct ObjectIter<'a> {
    ids: std::vec::IntoIter<i64>,
    qualified_name: String,
    factory: &'a dyn ModelFactory,
    reporter: &'a dyn ErrorReporter,
}

impl<'a> ObjectIter<'a> {
    pub(crate) fn new(
        ids: Vec<i64>,
        qualified_name: String,
        factory: &'a dyn ModelFactory,
        reporter: &'a dyn ErrorReporter,
    ) -> Self {
        Self {
            ids: ids.into_iter(),
            qualified_name,
            factory,
            reporter,
        }
    }
}

impl Iterator for ObjectIter<'_> {
    type Item = ModelInstance;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.ids.next()?;
            match self.factory.create(&self.qualified_name, id) {
                Ok(instance) => return Some(instance),
                Err(DecibelError::UnknownModelInstance { .. }) => {
                    tracing::debug!(model = %self.qualified_name, id, "skipping deleted instance");
                }
                // Any other factory failure ends the iteration; the
                // reporter records the cause so the truncation is visible.
                Err(error) => {
                    self.reporter.report(&error);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::instance::InMemoryModelFactory;

    #[derive(Default)]
    struct RecordingReporter {
        reported: Mutex<Vec<String>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, error: &DecibelError) {
            self.reported.lock().unwrap().push(error.to_string());
        }
    }

    /// Fails with a contract error for one id, resolves the rest.
    struct FaultyFactory {
        broken_id: i64,
    }

    impl ModelFactory for FaultyFactory {
        fn create(&self, qualified_name: &str, id: i64) -> DecibelResult<ModelInstance> {
            if id == self.broken_id {
                return Err(DecibelError::InvalidMethodCall(
                    "factory unavailable".to_string(),
                ));
            }
            Ok(ModelInstance::new(qualified_name, id))
        }
    }

    #[test]
    fn test_validate_page() {
        assert!(validate_page(1, 10).is_ok());
        assert!(validate_page(0, 10).is_err());
        assert!(validate_page(1, 0).is_err());
    }

    #[test]
    fn test_build_page_empty_is_none() {
        assert_eq!(build_page::<i64>(vec![], 0, 1, 10), None);
        let page = build_page(vec![1_i64], 1, 1, 10).unwrap();
        assert_eq!(page.content, vec![1]);
        assert_eq!(page.total_results, 1);
    }

    #[test]
    fn test_object_iter_skips_deleted() {
        let factory = InMemoryModelFactory::new();
        factory.insert(ModelInstance::new("blog.Article", 1));
        factory.insert(ModelInstance::new("blog.Article", 3));
        let reporter = RecordingReporter::default();
        let iter = ObjectIter::new(vec![1, 2, 3], "blog.Article".to_string(), &factory, &reporter);
        let ids: Vec<i64> = iter.map(|instance| instance.id()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(reporter.reported.lock().unwrap().is_empty());
    }

    #[test]
    fn test_object_iter_reports_non_data_error_before_truncating() {
        let factory = FaultyFactory { broken_id: 2 };
        let reporter = RecordingReporter::default();
        let iter = ObjectIter::new(vec![1, 2, 3], "blog.Article".to_string(), &factory, &reporter);
        let ids: Vec<i64> = iter.map(|instance| instance.id()).collect();
        assert_eq!(ids, vec![1]);
        let reported = reporter.reported.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].contains("factory unavailable"));
    }
}
