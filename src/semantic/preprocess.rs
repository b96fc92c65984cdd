//! Text preparation for lookups and embedding input.

use crate::schema::Table;

/// Maximum content length for embedding input (characters, not tokens)
const MAX_CONTENT_LENGTH: usize = 512;

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,

    #[error("query needs at least two words")]
    TooShort,

    #[error("query must contain words, not only numbers")]
    NoWords,
}

/// Trim, lowercase and collapse whitespace runs to one space.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reject queries too vague to identify tables from.
pub fn validate_query(query: &str) -> Result<String, QueryError> {
    let normalized = normalize_query(query);
    if normalized.is_empty() {
        return Err(QueryError::Empty);
    }
    if !normalized.chars().any(|c| c.is_alphabetic()) {
        return Err(QueryError::NoWords);
    }
    if normalized.split(' ').count() < 2 {
        return Err(QueryError::TooShort);
    }
    Ok(normalized)
}

/// Human-readable form of an identifier: `order_date` -> `order date`.
pub fn column_text(name: &str) -> String {
    name.replace(['_', '-'], " ").to_lowercase()
}

/// Text describing a table as a whole: schema, name and column names.
pub fn identity_text(table: &Table) -> String {
    let mut content = format!(
        "{} {}",
        column_text(table.id.schema()),
        column_text(table.id.table())
    );
    for column in &table.columns {
        content.push(' ');
        content.push_str(&column_text(&column.name));
    }
    truncate_content(&content)
}

/// Truncate content to MAX_CONTENT_LENGTH, adding ellipsis if truncated.
fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_LENGTH {
        return content.to_string();
    }

    let max_chars = MAX_CONTENT_LENGTH - TRUNCATION_SUFFIX.len();
    let truncated: String = content.chars().take(max_chars).collect();

    format!("{}{}", truncated, TRUNCATION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, TableId};

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_query("  Show   ME\tall Stores \n"), "show me all stores");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn validation_rules() {
        assert_eq!(validate_query(""), Err(QueryError::Empty));
        assert_eq!(validate_query("orders"), Err(QueryError::TooShort));
        assert_eq!(validate_query("2021 2022"), Err(QueryError::NoWords));
        assert_eq!(validate_query("Orders 2021").unwrap(), "orders 2021");
    }

    #[test]
    fn identity_text_lists_columns() {
        let table = Table {
            id: TableId::new("sales", "order_items"),
            columns: vec![Column {
                name: "unit_price".into(),
                data_type: "numeric".into(),
                nullable: true,
                is_primary_key: false,
                is_foreign_key: false,
            }],
        };
        assert_eq!(identity_text(&table), "sales order items unit price");
    }

    #[test]
    fn long_identity_text_is_truncated() {
        let long = "x".repeat(600);
        let out = truncate_content(&long);
        assert_eq!(out.chars().count(), MAX_CONTENT_LENGTH);
        assert!(out.ends_with(TRUNCATION_SUFFIX));
    }
}
