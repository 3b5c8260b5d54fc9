//! The fluent model search builder and query compiler.
//!
//! A [`ModelSearch`] accumulates conditions, sorts, groups, selects, and
//! joins, then compiles them into one SQL statement on first execution.
//! Preparation is idempotent; once a terminal method has run, the condition
//! set is frozen. Cloning a search keeps its user-supplied clauses and
//! resets every per-execution artifact.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use decibel_rs_core::error::{DecibelError, DecibelResult, ErrorClass, ErrorReporter};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::cache::ResultCache;
use crate::definition::{table_name_for, Definition, ModelKind, ROOT_MODEL};
use crate::executor::{QueryExecutor, Row};
use crate::fields::Field;
use crate::instance::{ModelFactory, ModelInstance};
use crate::registry::DefinitionRegistry;
use crate::search::condition::{FieldCondition, IgnoreCondition, OrCondition, SearchCondition};
use crate::search::criteria::{GroupCriteria, SortCriteria, SortOrder};
use crate::search::executer::{
    self, FieldExecuter, FieldsExecuter, IdExecuter, IdsExecuter, ObjectExecuter, ObjectsExecuter,
    ObjectIter, Page, PaginatedFieldsExecuter, PaginatedIdsExecuter, PaginatedObjectsExecuter,
};
use crate::search::join::Join;
use crate::search::operator::Operator;
use crate::search::select::{FieldRow, FieldSelect, SelectedValue};
use crate::value::Value;

/// The collaborators every search needs: definition registry, result cache,
/// error reporter, and model factory.
///
/// Constructed once per process (or per test) and handed to each search.
#[derive(Clone, Copy)]
pub struct SearchEnv<'a> {
    pub registry: &'a DefinitionRegistry,
    pub cache: &'a dyn ResultCache,
    pub reporter: &'a dyn ErrorReporter,
    pub factory: &'a dyn ModelFactory,
}

impl<'a> SearchEnv<'a> {
    /// Starts a search over the given model.
    pub fn search(&self, qualified_name: &str) -> DecibelResult<ModelSearch<'a>> {
        ModelSearch::new(*self, qualified_name)
    }
}

/// Join-alias bookkeeping for one condition scope.
///
/// Each top-level condition resolves with a fresh context, so AND'd
/// conditions on the same one-to-many field mint independent aliases. An
/// `OrCondition` passes one context to all its children, sharing aliases.
#[derive(Debug, Default)]
pub struct JoinContext {
    suffixes: HashMap<String, u32>,
}

/// A resolved field chain: the table alias and column the final field lives
/// at, plus the field's metadata.
pub(crate) struct ResolvedField {
    pub alias: String,
    pub column: String,
    pub field: Field,
}

/// One prepared include: its output name, rendered select SQL, and resolved
/// field metadata for later value conversion.
#[derive(Debug, Clone)]
pub(crate) struct IncludedSelect {
    pub name: String,
    pub sql: String,
    pub field: Field,
    pub select: FieldSelect,
}

/// Per-execution state, rebuilt by `prepare()` and discarded on clone.
#[derive(Debug, Default, Clone)]
struct SearchState {
    prepared: bool,
    joins: IndexMap<String, Join>,
    where_sql: Vec<String>,
    where_params: Vec<Value>,
    having_sql: Vec<String>,
    having_params: Vec<Value>,
    group_sql: Vec<String>,
    order_sql: Vec<String>,
    extra_selects: Vec<String>,
    include_meta: Vec<IncludedSelect>,
    key_select: Option<String>,
    alias_counter: u32,
}

/// The fluent search builder over one model type.
pub struct ModelSearch<'a> {
    env: SearchEnv<'a>,
    definition: Arc<Definition>,
    conditions: Vec<SearchCondition>,
    /// User-added joins, retained across clones; preparation copies them
    /// into the transient join set before minting its own.
    joins: IndexMap<String, Join>,
    sorts: Vec<(SortCriteria, SortOrder)>,
    groups: Vec<GroupCriteria>,
    includes: IndexMap<String, FieldSelect>,
    limit: Option<(u64, u64)>,
    key_field: Option<String>,
    caching: bool,
    debug: bool,
    state: SearchState,
}

// The `dyn` collaborators in the environment carry no `Debug` bound, so the
// impl covers the builder state only.
impl fmt::Debug for ModelSearch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSearch")
            .field("model", &self.definition.qualified_name())
            .field("conditions", &self.conditions)
            .field("joins", &self.joins)
            .field("sorts", &self.sorts)
            .field("groups", &self.groups)
            .field("includes", &self.includes)
            .field("limit", &self.limit)
            .field("key_field", &self.key_field)
            .field("caching", &self.caching)
            .field("debug", &self.debug)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Clone for ModelSearch<'_> {
    fn clone(&self) -> Self {
        Self {
            env: self.env,
            definition: Arc::clone(&self.definition),
            conditions: self.conditions.clone(),
            joins: self.joins.clone(),
            sorts: self.sorts.clone(),
            groups: self.groups.clone(),
            includes: self.includes.clone(),
            limit: self.limit,
            key_field: self.key_field.clone(),
            caching: self.caching,
            debug: self.debug,
            state: SearchState::default(),
        }
    }
}

impl<'a> ModelSearch<'a> {
    /// Creates a search over the model registered under `qualified_name`.
    ///
    /// Caching is on by default; results are keyed by `id`.
    pub fn new(env: SearchEnv<'a>, qualified_name: &str) -> DecibelResult<Self> {
        let definition = env.registry.load(qualified_name)?;
        Ok(Self {
            env,
            definition,
            conditions: Vec::new(),
            joins: IndexMap::new(),
            sorts: Vec::new(),
            groups: Vec::new(),
            includes: IndexMap::new(),
            limit: None,
            key_field: Some("id".to_string()),
            caching: true,
            debug: false,
            state: SearchState::default(),
        })
    }

    /// The searched model's definition.
    #[must_use]
    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    // ── Fluent builder API ─────────────────────────────────────────────

    /// Filters on a field with the default operator (`=`, or `IN` for list
    /// values). Model instances normalize to their ids via
    /// `Value::from(&instance)`.
    pub fn filter_by_field(self, field: &str, value: impl Into<Value>) -> DecibelResult<Self> {
        self.filter_by_chain(&[field], value)
    }

    /// Filters on a field with an explicit operator.
    pub fn filter_by_field_op(
        self,
        field: &str,
        value: impl Into<Value>,
        operator: Operator,
    ) -> DecibelResult<Self> {
        self.filter_by_chain_op(&[field], value, operator)
    }

    /// Filters through a chain of relational fields with the default
    /// operator.
    pub fn filter_by_chain(self, chain: &[&str], value: impl Into<Value>) -> DecibelResult<Self> {
        let value = value.into();
        let operator = Operator::default_for(&value);
        self.filter_by_chain_op(chain, value, operator)
    }

    /// Filters through a chain of relational fields with an explicit
    /// operator. The chain is validated immediately.
    pub fn filter_by_chain_op(
        self,
        chain: &[&str],
        value: impl Into<Value>,
        operator: Operator,
    ) -> DecibelResult<Self> {
        let chain: Vec<String> = chain.iter().map(ToString::to_string).collect();
        self.chained_fields(&chain)?;
        self.add_condition(SearchCondition::Field(FieldCondition::new(
            chain,
            value.into(),
            operator,
        )))
    }

    /// Filters by a named index. A multi-field index matches when *any* of
    /// its fields matches the value; this "taxonomy" policy is deliberate
    /// and differs from composite-key equality.
    pub fn filter_by_index(self, index_name: &str, value: impl Into<Value>) -> DecibelResult<Self> {
        let index = self
            .definition
            .index(index_name)
            .cloned()
            .ok_or_else(|| {
                DecibelError::InvalidParameterValue(format!(
                    "unknown index '{index_name}' on '{}'",
                    self.definition.qualified_name()
                ))
            })?;
        let value = value.into();
        let operator = Operator::default_for(&value);
        let mut conditions = Vec::with_capacity(index.fields().len());
        for field_name in index.fields() {
            let chain = vec![field_name.clone()];
            self.chained_fields(&chain)?;
            conditions.push(SearchCondition::Field(FieldCondition::new(
                chain,
                value.clone(),
                operator,
            )));
        }
        let condition = if conditions.len() > 1 {
            SearchCondition::Or(OrCondition::new(conditions))
        } else {
            match conditions.into_iter().next() {
                Some(single) => single,
                None => {
                    return Err(DecibelError::InvalidParameterValue(format!(
                        "index '{index_name}' has no fields"
                    )))
                }
            }
        };
        self.add_condition(condition)
    }

    /// Excludes a set of ids from the results.
    pub fn exclude_ids(self, ids: Vec<Value>) -> DecibelResult<Self> {
        self.add_condition(SearchCondition::Ignore(IgnoreCondition::new(ids)))
    }

    /// Adds an arbitrary condition. Fails with `SearchAlreadyExecuted` once
    /// the search has been prepared.
    pub fn add_condition(mut self, condition: SearchCondition) -> DecibelResult<Self> {
        self.assert_mutable()?;
        self.conditions.push(condition);
        Ok(self)
    }

    /// Sorts ascending by one field.
    pub fn sort_by_field(self, field: &str) -> DecibelResult<Self> {
        self.sort_by_chain(&[field], SortOrder::Ascending)
    }

    /// Sorts by a field chain in the given direction.
    pub fn sort_by_chain(self, chain: &[&str], order: SortOrder) -> DecibelResult<Self> {
        let criteria = SortCriteria::new(chain.iter().map(ToString::to_string).collect());
        self.add_sort_criteria(criteria, order, true)
    }

    /// Adds a sort criteria. Appending a criteria already present moves it
    /// to the end rather than duplicating it; `append = false` replaces the
    /// sort list. One-to-many fields cannot be sorted by.
    pub fn add_sort_criteria(
        mut self,
        criteria: SortCriteria,
        order: SortOrder,
        append: bool,
    ) -> DecibelResult<Self> {
        let fields = self.chained_fields(criteria.chain())?;
        if fields.last().is_some_and(Field::is_multi_valued) {
            return Err(DecibelError::InvalidParameterValue(format!(
                "cannot sort by one-to-many field '{}'",
                criteria.chain().join(".")
            )));
        }
        if append {
            if let Some(position) = self.sorts.iter().position(|(c, _)| c == &criteria) {
                self.sorts.remove(position);
            }
        } else {
            self.sorts.clear();
        }
        self.sorts.push((criteria, order));
        Ok(self)
    }

    /// Groups by a bare field name, auto-including the field in the select
    /// list.
    pub fn group_by_field(mut self, field: &str) -> DecibelResult<Self> {
        let chain = vec![field.to_string()];
        self.chained_fields(&chain)?;
        self = self.include_field(FieldSelect::new(field))?;
        self.group_by(GroupCriteria::new(chain), true)
    }

    /// Adds a group criteria. One-to-many fields cannot be grouped by.
    pub fn group_by(mut self, criteria: GroupCriteria, append: bool) -> DecibelResult<Self> {
        let fields = self.chained_fields(criteria.chain())?;
        if fields.last().is_some_and(Field::is_multi_valued) {
            return Err(DecibelError::InvalidParameterValue(format!(
                "cannot group by one-to-many field '{}'",
                criteria.chain().join(".")
            )));
        }
        if !append {
            self.groups.clear();
        }
        self.groups.push(criteria);
        Ok(self)
    }

    /// Includes a field in the result set by name.
    pub fn include_field_name(self, name: &str) -> DecibelResult<Self> {
        self.include_field(FieldSelect::new(name))
    }

    /// Includes a field select. Selects are keyed by output name; a second
    /// include with the same output name replaces the first.
    pub fn include_field(mut self, select: FieldSelect) -> DecibelResult<Self> {
        self.chained_fields(select.chain())?;
        self.includes.insert(select.output_name(), select);
        Ok(self)
    }

    /// Limits the result set. `None` clears any limit.
    #[must_use]
    pub fn limit_to(mut self, count: Option<u64>, from: u64) -> Self {
        self.limit = count.map(|c| (from, c));
        self
    }

    /// Sets the field used as the key of associative results. The field
    /// must exist and be unique; `None` selects positional results.
    pub fn use_key(mut self, field: Option<&str>) -> DecibelResult<Self> {
        match field {
            Some(name) => {
                if self.definition.field(name).is_none() {
                    return Err(DecibelError::InvalidParameterValue(format!(
                        "unknown field '{name}' on '{}'",
                        self.definition.qualified_name()
                    )));
                }
                if !self.definition.is_field_unique(name) {
                    return Err(DecibelError::InvalidParameterValue(format!(
                        "field '{name}' is not unique and cannot key results"
                    )));
                }
                self.key_field = Some(name.to_string());
            }
            None => self.key_field = None,
        }
        Ok(self)
    }

    /// Enables or disables result caching for this search.
    #[must_use]
    pub const fn set_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    /// Enables debug mode, which disables caching for this search.
    #[must_use]
    pub const fn set_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Adds a user-specified join. Alias collisions with a different join
    /// are rejected rather than silently overwritten.
    pub fn add_join(mut self, join: Join) -> DecibelResult<Self> {
        if let Some(existing) = self.joins.get(join.alias()) {
            if existing.is_duplicate_of(&join) {
                return Ok(self);
            }
            return Err(DecibelError::InvalidParameterValue(format!(
                "join alias '{}' is already used for a different join",
                join.alias()
            )));
        }
        self.joins.insert(join.alias().to_string(), join);
        Ok(self)
    }

    // ── Chain resolution ───────────────────────────────────────────────

    /// Resolves a field chain to its field list without requesting joins.
    ///
    /// Every non-final name must be a relational field; the chain walks
    /// into the linked model's definition at each hop. A `parent` field on
    /// a child model resolves its target through the `parent_model` option.
    pub fn chained_fields(&self, chain: &[String]) -> DecibelResult<Vec<Field>> {
        if chain.is_empty() {
            return Err(DecibelError::InvalidParameterValue(
                "field chain cannot be empty".to_string(),
            ));
        }
        let mut def = Arc::clone(&self.definition);
        let mut fields = Vec::with_capacity(chain.len());
        for (i, name) in chain.iter().enumerate() {
            let field = def.field(name).cloned().ok_or_else(|| {
                DecibelError::InvalidParameterValue(format!(
                    "unknown field '{name}' on '{}'",
                    def.qualified_name()
                ))
            })?;
            if i + 1 < chain.len() {
                let target = self.link_target_of(&def, &field)?;
                def = self.env.registry.load(&target)?;
            }
            fields.push(field);
        }
        Ok(fields)
    }

    /// The model a relational field links to. A `parent` field on a child
    /// model resolves through the `parent_model` definition option rather
    /// than the field's declared target.
    fn link_target_of(&self, def: &Definition, field: &Field) -> DecibelResult<String> {
        if def.kind() == ModelKind::Child && field.name() == "parent" {
            if let Some(target) = self
                .env
                .registry
                .option(def, "parent_model")
                .as_ref()
                .and_then(serde_json::Value::as_str)
            {
                return Ok(target.to_string());
            }
        }
        field
            .link_target()
            .filter(|target| !target.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                DecibelError::InvalidParameterValue(format!(
                    "field '{}' on '{}' is not relational and cannot appear mid-chain",
                    field.name(),
                    def.qualified_name()
                ))
            })
    }

    /// Resolves a chain while minting the joins it needs.
    ///
    /// Many-to-one hops derive deterministic aliases from the chain path.
    /// One-to-many hops additionally mint a numeric suffix from the
    /// search's counter, reused within one [`JoinContext`] only.
    pub(crate) fn resolve_chain(
        &mut self,
        chain: &[String],
        ctx: &mut JoinContext,
    ) -> DecibelResult<ResolvedField> {
        if chain.is_empty() {
            return Err(DecibelError::InvalidParameterValue(
                "field chain cannot be empty".to_string(),
            ));
        }
        let base_table = self.definition.table_name().to_string();
        let mut def = Arc::clone(&self.definition);
        let mut alias = base_table.clone();
        let mut path = String::new();
        for (i, name) in chain.iter().enumerate() {
            let field = def.field(name).cloned().ok_or_else(|| {
                DecibelError::InvalidParameterValue(format!(
                    "unknown field '{name}' on '{}'",
                    def.qualified_name()
                ))
            })?;
            // Inherited fields live in an ancestor's table, joined on the
            // shared primary key.
            let owning_alias = if field.table().is_empty()
                || field.table() == def.table_name()
                || field.column_name().is_none()
            {
                alias.clone()
            } else {
                let ancestor_alias = if alias == base_table {
                    field.table().to_string()
                } else {
                    format!("{alias}__{}", field.table())
                };
                self.push_join(Join::inner(
                    field.table(),
                    ancestor_alias.clone(),
                    format!("\"{ancestor_alias}\".\"id\" = \"{alias}\".\"id\""),
                ))?;
                ancestor_alias
            };
            let owning_table = if field.table().is_empty() {
                def.table_name().to_string()
            } else {
                field.table().to_string()
            };
            if i + 1 == chain.len() {
                if field.is_multi_valued() {
                    let segment = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{path}__{name}")
                    };
                    let suffix = self.mint_suffix(ctx, &segment);
                    let link_alias = format!("{base_table}__{segment}_{suffix}");
                    let link_table = field.link_table(&owning_table).unwrap_or_default();
                    self.push_join(Join::left(
                        link_table,
                        link_alias.clone(),
                        format!("\"{link_alias}\".\"source_id\" = \"{owning_alias}\".\"id\""),
                    ))?;
                    return Ok(ResolvedField {
                        alias: link_alias,
                        column: "value_id".to_string(),
                        field,
                    });
                }
                return Ok(ResolvedField {
                    alias: owning_alias,
                    column: field.condition_column(),
                    field,
                });
            }
            let target = self.link_target_of(&def, &field)?;
            let target_def = self.env.registry.load(&target)?;
            path = if path.is_empty() {
                name.clone()
            } else {
                format!("{path}__{name}")
            };
            if field.is_multi_valued() {
                let suffix = self.mint_suffix(ctx, &path);
                let link_alias = format!("{base_table}__{path}_{suffix}");
                let link_table = field.link_table(&owning_table).unwrap_or_default();
                self.push_join(Join::left(
                    link_table,
                    link_alias.clone(),
                    format!("\"{link_alias}\".\"source_id\" = \"{owning_alias}\".\"id\""),
                ))?;
                let target_alias = format!("{link_alias}__t");
                self.push_join(Join::left(
                    target_def.table_name(),
                    target_alias.clone(),
                    format!("\"{target_alias}\".\"id\" = \"{link_alias}\".\"value_id\""),
                ))?;
                alias = target_alias;
            } else {
                let next_alias = format!("{base_table}__{path}");
                self.push_join(Join::inner(
                    target_def.table_name(),
                    next_alias.clone(),
                    format!(
                        "\"{next_alias}\".\"id\" = \"{owning_alias}\".\"{}_id\"",
                        field.name()
                    ),
                ))?;
                alias = next_alias;
            }
            def = target_def;
        }
        Err(DecibelError::InvalidParameterValue(
            "field chain cannot be empty".to_string(),
        ))
    }

    fn mint_suffix(&mut self, ctx: &mut JoinContext, path: &str) -> u32 {
        if let Some(existing) = ctx.suffixes.get(path) {
            return *existing;
        }
        self.state.alias_counter += 1;
        ctx.suffixes
            .insert(path.to_string(), self.state.alias_counter);
        self.state.alias_counter
    }

    fn push_join(&mut self, join: Join) -> DecibelResult<()> {
        if let Some(existing) = self.state.joins.get(join.alias()) {
            if existing.is_duplicate_of(&join) {
                return Ok(());
            }
            return Err(DecibelError::InvalidParameterValue(format!(
                "join alias '{}' is already used for a different join",
                join.alias()
            )));
        }
        self.state.joins.insert(join.alias().to_string(), join);
        Ok(())
    }

    // ── Preparation and SQL assembly ───────────────────────────────────

    fn assert_mutable(&self) -> DecibelResult<()> {
        if self.state.prepared {
            return Err(DecibelError::SearchAlreadyExecuted);
        }
        Ok(())
    }

    /// Compiles accumulated clauses into SQL fragments. Idempotent; guarded
    /// by the prepared flag.
    pub(crate) fn prepare(&mut self) -> DecibelResult<()> {
        if self.state.prepared {
            return Ok(());
        }
        let span = decibel_rs_core::logging::search_span(self.definition.qualified_name());
        let _guard = span.enter();

        self.state.joins = self.joins.clone();

        // Standard models share attributes in the root table.
        if self.definition.kind().joins_hierarchy()
            && self.definition.qualified_name() != ROOT_MODEL
        {
            let root_table = table_name_for(ROOT_MODEL);
            let base = self.definition.table_name().to_string();
            self.push_join(Join::inner(
                root_table.clone(),
                root_table.clone(),
                format!("\"{root_table}\".\"id\" = \"{base}\".\"id\""),
            ))?;
        }

        if let Some(key) = self.key_field.clone() {
            if key != "id" {
                let mut ctx = JoinContext::default();
                let resolved = self.resolve_chain(&[key], &mut ctx)?;
                self.state.key_select = Some(format!(
                    "\"{}\".\"{}\" AS \"__key\"",
                    resolved.alias, resolved.column
                ));
            }
        }

        let includes: Vec<FieldSelect> = self.includes.values().cloned().collect();
        for select in &includes {
            let mut ctx = JoinContext::default();
            let (sql, field) = select.resolve(self, &mut ctx)?;
            self.state.include_meta.push(IncludedSelect {
                name: select.output_name(),
                sql,
                field,
                select: select.clone(),
            });
        }

        // Hierarchy and one-to-many joins multiply rows per logical
        // instance; grouping by the unique id collapses them whenever a
        // plain field is selected without an explicit group.
        if self.groups.is_empty()
            && self.definition.kind().joins_hierarchy()
            && self
                .state
                .include_meta
                .iter()
                .any(|meta| !meta.select.is_aggregate())
        {
            self.state
                .group_sql
                .push(format!("\"{}\".\"id\"", self.definition.table_name()));
        }
        let groups = self.groups.clone();
        for group in &groups {
            let mut ctx = JoinContext::default();
            let expr = group.criteria_sql(self, &mut ctx)?;
            self.state.group_sql.push(expr);
        }

        let sorts = self.sorts.clone();
        for (criteria, order) in &sorts {
            let mut ctx = JoinContext::default();
            let expr = criteria.criteria_sql(self, &mut ctx)?;
            self.state.order_sql.push(format!("{expr} {}", order.sql()));
        }

        // Fresh context per top-level condition: AND'd one-to-many filters
        // must not share joins.
        let conditions = self.conditions.clone();
        for condition in &conditions {
            let mut ctx = JoinContext::default();
            let fragment = condition.condition(self, &mut ctx)?;
            self.state.extra_selects.extend(fragment.selects);
            if let Some(sql) = fragment.where_sql {
                self.state.where_sql.push(sql);
                self.state.where_params.extend(fragment.where_params);
            }
            if let Some(sql) = fragment.having_sql {
                self.state.having_sql.push(sql);
                self.state.having_params.extend(fragment.having_params);
            }
        }

        self.order_joins();

        let join_wheres: Vec<(String, Vec<Value>)> = self
            .state
            .joins
            .values()
            .filter_map(|join| {
                join.where_sql()
                    .map(|sql| (sql.to_string(), join.where_params().to_vec()))
            })
            .collect();
        for (sql, params) in join_wheres {
            self.state.where_sql.push(sql);
            self.state.where_params.extend(params);
        }

        self.state.prepared = true;
        tracing::debug!(
            joins = self.state.joins.len(),
            conditions = conditions.len(),
            "search prepared"
        );
        Ok(())
    }

    /// Reorders joins for hierarchy-joined models: per-class tables from
    /// most-derived to most-ancestral, root table last among them, other
    /// joins after in insertion order. The sort is stable.
    fn order_joins(&mut self) {
        if !self.definition.kind().joins_hierarchy() {
            return;
        }
        let mut rank_tables = self.definition.hierarchy_tables();
        rank_tables.push(table_name_for(ROOT_MODEL));
        let outside_rank = rank_tables.len();
        let mut joins: Vec<Join> = self.state.joins.values().cloned().collect();
        joins.sort_by_key(|join| {
            rank_tables
                .iter()
                .position(|table| table == join.table())
                .unwrap_or(outside_rank)
        });
        self.state.joins = joins
            .into_iter()
            .map(|join| (join.alias().to_string(), join))
            .collect();
    }

    fn build_sql(
        &self,
        selects: &[String],
        distinct: bool,
        with_order: bool,
        with_limit: bool,
    ) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        if distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&selects.join(", "));
        sql.push_str(" FROM \"");
        sql.push_str(self.definition.table_name());
        sql.push('"');
        for join in self.state.joins.values() {
            sql.push(' ');
            sql.push_str(&join.sql());
        }
        if !self.state.where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.state.where_sql.join(" AND "));
        }
        if !self.state.group_sql.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.state.group_sql.join(", "));
        }
        if !self.state.having_sql.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.state.having_sql.join(" AND "));
        }
        if with_order && !self.state.order_sql.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.state.order_sql.join(", "));
        }
        if with_limit {
            if let Some((from, count)) = self.limit {
                if from > 0 {
                    sql.push_str(&format!(" LIMIT {from}, {count}"));
                } else {
                    sql.push_str(&format!(" LIMIT {count}"));
                }
            }
        }
        let mut params = self.state.where_params.clone();
        params.extend(self.state.having_params.iter().cloned());
        (sql, params)
    }

    /// Prepares the search and returns the id-list SQL with its parameters,
    /// without executing. Useful for diagnostics.
    pub fn ids_sql(&mut self) -> DecibelResult<(String, Vec<Value>)> {
        self.prepare()?;
        let mut selects = vec![self.id_select()];
        if let Some(key) = self.state.key_select.clone() {
            selects.push(key);
        }
        Ok(self.build_sql(
            &selects,
            self.definition.kind().deduplicates_rows(),
            true,
            true,
        ))
    }

    // ── Execution core ─────────────────────────────────────────────────

    pub(crate) fn run(
        &mut self,
        db: &dyn QueryExecutor,
        selects: Vec<String>,
        distinct: bool,
        with_order: bool,
        with_limit: bool,
        cache_tag: &str,
    ) -> DecibelResult<Vec<Row>> {
        self.prepare()?;
        let mut selects = selects;
        selects.extend(self.state.extra_selects.iter().cloned());
        let (sql, params) = self.build_sql(&selects, distinct, with_order, with_limit);
        tracing::debug!(sql = %sql, params = params.len(), "executing search");
        if self.caching_active() {
            let key = self.cache_key(&sql, &params, cache_tag);
            if let Some(rows) = self
                .env
                .cache
                .get(self.definition.qualified_name(), &key)
            {
                tracing::debug!(key = %key, "search cache hit");
                return Ok(rows);
            }
            let rows = db.execute(&sql, &params)?;
            self.env
                .cache
                .set(self.definition.qualified_name(), &key, rows.clone());
            return Ok(rows);
        }
        db.execute(&sql, &params)
    }

    pub(crate) fn caching_active(&self) -> bool {
        self.caching && !self.debug
    }

    fn cache_key(&self, sql: &str, params: &[Value], tag: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        for param in params {
            hasher.update(format!("{param:?}").as_bytes());
        }
        hasher.update(tag.as_bytes());
        for meta in &self.state.include_meta {
            hasher.update(meta.select.cache_id().as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    pub(crate) fn absolute_count(&mut self, db: &dyn QueryExecutor) -> DecibelResult<u64> {
        self.prepare()?;
        // With grouping, the count is the number of groups.
        if !self.state.group_sql.is_empty() {
            let selects = self.state.group_sql.clone();
            let rows = self.run(db, selects, false, false, false, "count")?;
            return Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX));
        }
        let expr = if self.definition.kind().deduplicates_rows() {
            format!("COUNT(DISTINCT \"{}\".\"id\")", self.definition.table_name())
        } else {
            "COUNT(*)".to_string()
        };
        let rows = self.run(
            db,
            vec![format!("{expr} AS \"count\"")],
            false,
            false,
            false,
            "count",
        )?;
        match rows.first() {
            Some(row) => Ok(u64::try_from(row.require_int("count")?).unwrap_or(0)),
            None => Ok(0),
        }
    }

    // ── Internal accessors for executors ───────────────────────────────

    pub(crate) fn id_select(&self) -> String {
        format!("\"{}\".\"id\" AS \"id\"", self.definition.table_name())
    }

    pub(crate) fn key_select_sql(&self) -> Option<String> {
        self.state.key_select.clone()
    }

    pub(crate) fn deduplicates(&self) -> bool {
        self.definition.kind().deduplicates_rows()
    }

    pub(crate) fn include_meta(&self) -> &[IncludedSelect] {
        &self.state.include_meta
    }

    pub(crate) fn key_field(&self) -> Option<&str> {
        self.key_field.as_deref()
    }

    pub(crate) fn factory(&self) -> &'a dyn ModelFactory {
        self.env.factory
    }

    pub(crate) fn qualified_name_owned(&self) -> String {
        self.definition.qualified_name().to_string()
    }

    pub(crate) fn set_limit(&mut self, from: u64, count: u64) {
        self.limit = Some((from, count));
    }

    fn degrade<T>(&self, result: DecibelResult<T>, empty: impl FnOnce() -> T) -> DecibelResult<T> {
        match result {
            Err(error) if error.class() == ErrorClass::Infrastructure => {
                self.env.reporter.report(&error);
                tracing::warn!("search degraded to empty result after execution failure");
                Ok(empty())
            }
            other => other,
        }
    }

    // ── Terminal read operations ───────────────────────────────────────

    /// The number of matching instances (number of groups for a grouped
    /// search). Degrades to 0 on execution failure.
    pub fn get_count(&mut self, db: &dyn QueryExecutor) -> DecibelResult<u64> {
        let result = executer::count(self, db);
        self.degrade(result, || 0)
    }

    /// Whether any instance matches.
    pub fn has_results(&mut self, db: &dyn QueryExecutor) -> DecibelResult<bool> {
        Ok(self.get_count(db)? > 0)
    }

    /// All matching ids. Degrades to an empty list on execution failure.
    pub fn get_ids(&mut self, db: &dyn QueryExecutor) -> DecibelResult<Vec<i64>> {
        let result = IdsExecuter::execute(self, db);
        self.degrade(result, Vec::new)
    }

    /// The id at `index`, if present.
    pub fn get_id(&mut self, db: &dyn QueryExecutor, index: usize) -> DecibelResult<Option<i64>> {
        let result = IdExecuter { index }.run(self, db);
        self.degrade(result, || None)
    }

    /// All matching instances, skipping ids that no longer resolve.
    pub fn get_objects(&mut self, db: &dyn QueryExecutor) -> DecibelResult<Vec<ModelInstance>> {
        let result = ObjectsExecuter::execute(self, db);
        self.degrade(result, Vec::new)
    }

    /// The instance at `index`, if present and alive.
    pub fn get_object(
        &mut self,
        db: &dyn QueryExecutor,
        index: usize,
    ) -> DecibelResult<Option<ModelInstance>> {
        let result = ObjectExecuter { index }.run(self, db);
        self.degrade(result, || None)
    }

    /// Values of one field, keyed by the search's key field.
    pub fn get_field(
        &mut self,
        db: &dyn QueryExecutor,
        name: &str,
    ) -> DecibelResult<Vec<(Value, SelectedValue)>> {
        let result = FieldExecuter::execute(self, db, name);
        self.degrade(result, Vec::new)
    }

    /// All included field values, one row per logical instance.
    pub fn get_fields(&mut self, db: &dyn QueryExecutor) -> DecibelResult<Vec<FieldRow>> {
        let result = FieldsExecuter::execute(self, db);
        self.degrade(result, Vec::new)
    }

    /// One page of ids with the absolute total. `None` when nothing
    /// matches.
    pub fn get_ids_page(
        &mut self,
        db: &dyn QueryExecutor,
        page_number: u64,
        page_size: u64,
    ) -> DecibelResult<Option<Page<i64>>> {
        let result = PaginatedIdsExecuter {
            page_number,
            page_size,
        }
        .run(self, db);
        self.degrade(result, || None)
    }

    /// One page of instances with the absolute total.
    pub fn get_objects_page(
        &mut self,
        db: &dyn QueryExecutor,
        page_number: u64,
        page_size: u64,
    ) -> DecibelResult<Option<Page<ModelInstance>>> {
        let result = PaginatedObjectsExecuter {
            page_number,
            page_size,
        }
        .run(self, db);
        self.degrade(result, || None)
    }

    /// One page of field rows with the absolute total.
    pub fn get_fields_page(
        &mut self,
        db: &dyn QueryExecutor,
        page_number: u64,
        page_size: u64,
    ) -> DecibelResult<Option<Page<FieldRow>>> {
        let result = PaginatedFieldsExecuter {
            page_number,
            page_size,
        }
        .run(self, db);
        self.degrade(result, || None)
    }

    /// Lazily iterates matching instances, silently skipping ids deleted
    /// since the id query ran.
    pub fn iter_objects(&mut self, db: &dyn QueryExecutor) -> DecibelResult<ObjectIter<'a>> {
        let ids = self.get_ids(db)?;
        Ok(ObjectIter::new(
            ids,
            self.qualified_name_owned(),
            self.env.factory,
            self.env.reporter,
        ))
    }

    pub(crate) fn ensure_included(&mut self, name: &str) -> DecibelResult<()> {
        if self.includes.contains_key(name) {
            return Ok(());
        }
        if self.state.prepared {
            return Err(DecibelError::InvalidMethodCall(format!(
                "field '{name}' was not included before the search was executed"
            )));
        }
        let select = FieldSelect::new(name);
        self.chained_fields(select.chain())?;
        self.includes.insert(select.output_name(), select);
        Ok(())
    }

    pub(crate) fn has_includes(&self) -> bool {
        !self.includes.is_empty()
    }
}
