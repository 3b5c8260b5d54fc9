//! The model search engine: fluent builder, clause value objects, query
//! compilation, and output-shape executors.

pub mod condition;
pub mod criteria;
pub mod executer;
pub mod join;
pub mod model_search;
pub mod operator;
pub mod select;

pub use condition::{ConditionSql, FieldCondition, IgnoreCondition, OrCondition, SearchCondition};
pub use criteria::{GroupCriteria, SortCriteria, SortOrder};
pub use executer::{ObjectIter, Page};
pub use join::{Join, JoinType};
pub use model_search::{JoinContext, ModelSearch, SearchEnv};
pub use operator::Operator;
pub use select::{Aggregate, FieldRow, FieldSelect, ReturnMode, SelectedValue};
