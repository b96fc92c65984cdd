//! Keyword matching of queries against schema names.
//!
//! Used by the pattern stage and by the keyword fallback when nothing richer
//! is available.

use crate::schema::{SchemaView, TableId};

use super::preprocess::column_text;

/// Names shorter than this are too ambiguous to match by containment
const MIN_NAME_LENGTH: usize = 3;

pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being",
    "in", "on", "at", "to", "for", "of", "with", "by", "from", "as",
    "and", "or", "but", "not", "no", "so", "if", "then",
    "show", "me", "all", "list", "get", "give", "find", "what", "which", "who",
    "how", "many", "much", "i", "my", "we", "our", "their", "that", "this",
    "these", "those", "do", "does", "did", "have", "has", "had", "any", "some",
    "each", "every", "per", "please", "there", "where", "when", "it", "its",
];

/// Tokenize query into lowercase terms.
/// Filters out very short terms (1 char) and common stop words.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .map(|s| s.to_lowercase())
        .filter(|s| s.len() > 1 && !STOP_WORDS.contains(&s.as_str()))
        .collect()
}

/// Whether a schema name (or its underscore-to-space form) occurs in the
/// normalized query.
pub fn mentions(query: &str, name: &str) -> bool {
    let name = name.to_lowercase();
    if name.chars().count() < MIN_NAME_LENGTH {
        return false;
    }
    query.contains(&name) || query.contains(&column_text(&name))
}

/// Tables whose own name or any column name occurs in the query, in schema
/// enumeration order.
pub fn mentioned_tables(query: &str, schema: &SchemaView) -> Vec<TableId> {
    schema
        .tables()
        .iter()
        .filter(|table| {
            mentions(query, table.id.table())
                || table.columns.iter().any(|c| mentions(query, &c.name))
        })
        .map(|table| table.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let terms = tokenize("Show me all stores with store_names!");
        assert_eq!(terms, vec!["stores", "store", "names"]);
    }

    #[test]
    fn mentions_handles_underscores_and_short_names() {
        assert!(mentions("orders by order date", "order_date"));
        assert!(mentions("list customer_id values", "customer_id"));
        assert!(!mentions("id of everything", "id"));
        assert!(!mentions("stores", "STORE_NAME"));
    }

    #[test]
    fn mentioned_tables_in_enumeration_order() {
        let schema = SchemaView::from_json_str(
            r#"{"tables": {"sales": ["orders", "customers"]},
                "columns": {"sales": {"customers": {"city": {}}, "orders": {"order_date": {}}}}}"#,
        )
        .unwrap();

        let tables = mentioned_tables("customers by city and orders", &schema);
        let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["sales.orders", "sales.customers"]);

        assert!(mentioned_tables("nothing relevant here", &schema).is_empty());
    }
}
