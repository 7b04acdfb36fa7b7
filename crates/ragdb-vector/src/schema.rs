use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("tenant_id", DataType::Utf8, false),
		Field::new("namespace", DataType::Utf8, false),
		Field::new("source_type", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// SQL-style predicate restricting a query to one scope. Literals are quote-escaped.
pub fn scope_filter(scope: &ragdb_core::types::Scope) -> String {
	format!(
		"tenant_id = '{}' AND namespace = '{}'",
		scope.tenant().replace('\'', "''"),
		scope.namespace().replace('\'', "''")
	)
}
