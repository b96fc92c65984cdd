use crate::cli::errors::{CliError, CliResult};

/// Join the words of a query given as trailing arguments.
pub fn join_query(words: &[String]) -> CliResult<String> {
    let query = words.join(" ");
    if query.trim().is_empty() {
        return Err(CliError::validation("query", "Query cannot be empty"));
    }
    Ok(query)
}

/// Parse a comma separated `schema.table` list.
///
/// Only the shape is checked here; whether the tables exist is up to the
/// schema.
pub fn parse_tables(tables: &str) -> CliResult<Vec<String>> {
    let mut parsed: Vec<String> = Vec::new();

    for name in tables.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(CliError::validation(
                "tables",
                format!("'{name}' is not of the form schema.table"),
            ));
        }
        if !parsed.iter().any(|t| t.eq_ignore_ascii_case(name)) {
            parsed.push(name.to_string());
        }
    }

    if parsed.is_empty() {
        return Err(CliError::validation("tables", "At least one table is required"));
    }
    Ok(parsed)
}

pub fn validate_top_n(n: usize) -> CliResult<()> {
    if n == 0 {
        return Err(CliError::validation("n", "Must be greater than 0"));
    }
    if n > 1000 {
        return Err(CliError::validation("n", "Cannot exceed 1000"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tables() {
        assert_eq!(
            parse_tables(" sales.orders, sales.customers ,").unwrap(),
            vec!["sales.orders", "sales.customers"]
        );
        assert_eq!(parse_tables("sales.orders,SALES.ORDERS").unwrap().len(), 1);
    }

    #[test]
    fn test_parse_tables_rejects_malformed() {
        assert!(parse_tables("").is_err());
        assert!(parse_tables("orders").is_err());
        assert!(parse_tables("a.b.c").is_err());
        assert!(parse_tables("sales.").is_err());
    }

    #[test]
    fn test_join_query() {
        let words = vec!["orders".to_string(), "last".to_string(), "year".to_string()];
        assert_eq!(join_query(&words).unwrap(), "orders last year");
        assert!(join_query(&[]).is_err());
    }

    #[test]
    fn test_validate_top_n() {
        assert!(validate_top_n(3).is_ok());
        assert!(validate_top_n(0).is_err());
    }
}
