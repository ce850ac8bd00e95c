//! Handling of the display and label queries stored in `ModelLabel`.
//!
//! Those queries are data, not code: the serial number is substituted into
//! their text and the column names are read back out of the select list so
//! that each value can be paired with the template field it feeds.

use std::fmt;

use sea_orm::QueryResult;
use tracing::warn;

use crate::errors::ServiceError;
use crate::models::{FieldSet, FieldValue, SerialNumber};

/// Which stored query of a model to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldQueryKind {
    Display,
    Label,
}

impl FieldQueryKind {
    /// `ModelLabel` column holding the query text
    pub fn column(&self) -> &'static str {
        match self {
            Self::Display => "DisplayFieldQuery",
            Self::Label => "LabelFieldQuery",
        }
    }
}

impl fmt::Display for FieldQueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display => f.write_str("display"),
            Self::Label => f.write_str("label"),
        }
    }
}

/// Substitutes the serial number for every occurrence of `token`.
pub fn bind_serial(query: &str, token: &str, sn: &SerialNumber) -> Result<String, ServiceError> {
    if token.is_empty() {
        return Err(ServiceError::QueryError(
            "Serial number token is empty".to_string(),
        ));
    }

    if !query.contains(token) {
        warn!(token = %token, "Stored query does not reference the serial number token");
    }

    Ok(query.replace(token, sn.as_str()))
}

/// Reads the column names of a query's select list.
///
/// The list runs from the first `SELECT` to the first top-level `FROM`.
/// Items are split on top-level commas; an item's name is its `AS` alias when
/// present, otherwise the last segment of a plain column reference, otherwise
/// the expression text itself.
pub fn select_column_names(query: &str) -> Result<Vec<String>, ServiceError> {
    let upper = query.to_ascii_uppercase();

    let select_at = find_keyword(&upper, "SELECT", 0)
        .ok_or_else(|| ServiceError::QueryError("Query has no SELECT clause".to_string()))?;
    let list_start = select_at + "SELECT".len();

    let mut items = Vec::new();
    let mut item_start = list_start;
    let mut from_found = false;
    for i in top_level_positions(&upper, list_start) {
        let byte = upper.as_bytes()[i];
        if byte == b',' {
            items.push(&query[item_start..i]);
            item_start = i + 1;
        } else if keyword_at(&upper, i, "FROM") {
            items.push(&query[item_start..i]);
            from_found = true;
            break;
        }
    }

    if !from_found {
        return Err(ServiceError::QueryError(
            "Query has no FROM clause after its select list".to_string(),
        ));
    }

    if let Some(first) = items.first_mut() {
        *first = strip_select_modifiers(first);
    }

    items.into_iter().map(column_label).collect()
}

/// Pairs each column name with the value at the same position in `row`.
///
/// The row must have exactly as many columns as there are names.
pub fn zip_row(names: &[String], row: &QueryResult) -> Result<FieldSet, ServiceError> {
    let columns = row.column_names().len();
    if columns != names.len() {
        return Err(ServiceError::QueryError(format!(
            "Query returned {} columns but its select list names {}",
            columns,
            names.len()
        )));
    }

    let mut fields = FieldSet::new();
    for (index, name) in names.iter().enumerate() {
        let value = FieldValue::from_row(row, index).map_err(|e| {
            ServiceError::QueryError(format!("Cannot read column {} ({}): {}", index, name, e))
        })?;
        fields.insert(name.clone(), value);
    }

    Ok(fields)
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'@' || byte == b'#' || byte == b'$'
}

/// Whether `keyword` starts at `at` as a whole word. `upper` must be upper case.
fn keyword_at(upper: &str, at: usize, keyword: &str) -> bool {
    let bytes = upper.as_bytes();
    if !bytes[at..].starts_with(keyword.as_bytes()) {
        return false;
    }
    let before_ok = at == 0 || !is_ident_byte(bytes[at - 1]);
    let after = at + keyword.len();
    let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
    before_ok && after_ok
}

fn find_keyword(upper: &str, keyword: &str, from: usize) -> Option<usize> {
    upper[from..]
        .match_indices(keyword)
        .map(|(offset, _)| from + offset)
        .find(|at| keyword_at(upper, *at, keyword))
}

/// Byte positions at parenthesis depth zero that are outside quoted text.
fn top_level_positions(text: &str, start: usize) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut positions = Vec::new();
    let mut depth = 0usize;
    let mut closing: Option<u8> = None;

    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if let Some(close) = closing {
            if byte == close {
                closing = None;
            }
            continue;
        }
        match byte {
            b'\'' | b'"' | b'`' => closing = Some(byte),
            b'[' => closing = Some(b']'),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => positions.push(i),
            _ => {}
        }
    }

    positions
}

/// Drops `DISTINCT`, `ALL` and `TOP n` from the head of the select list.
fn strip_select_modifiers(item: &str) -> &str {
    let mut rest = item.trim_start();
    loop {
        let upper = rest.to_ascii_uppercase();
        if keyword_at(&upper, 0, "DISTINCT") {
            rest = rest["DISTINCT".len()..].trim_start();
        } else if keyword_at(&upper, 0, "ALL") {
            rest = rest["ALL".len()..].trim_start();
        } else if keyword_at(&upper, 0, "TOP") {
            rest = skip_top_count(rest["TOP".len()..].trim_start());
        } else {
            return rest;
        }
    }
}

fn skip_top_count(rest: &str) -> &str {
    if rest.starts_with('(') {
        match rest.find(')') {
            Some(close) => rest[close + 1..].trim_start(),
            None => rest,
        }
    } else {
        let end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        rest[end..].trim_start()
    }
}

fn column_label(item: &str) -> Result<String, ServiceError> {
    let item = item.trim();
    if item.is_empty() {
        return Err(ServiceError::QueryError(
            "Select list contains an empty column".to_string(),
        ));
    }

    if item == "*" || item.ends_with(".*") {
        return Err(ServiceError::QueryError(format!(
            "Select list item '{}' does not name its columns",
            item
        )));
    }

    let upper = item.to_ascii_uppercase();
    let alias_at = top_level_positions(&upper, 0)
        .into_iter()
        .filter(|at| keyword_at(&upper, *at, "AS"))
        .last();

    let label = match alias_at {
        Some(at) => unquote(item[at + "AS".len()..].trim()),
        None if is_column_reference(item) => {
            let last = last_segment(item);
            unquote(last)
        }
        None => item,
    };

    if label.is_empty() {
        return Err(ServiceError::QueryError(format!(
            "Cannot determine a column name for '{}'",
            item
        )));
    }

    Ok(label.to_string())
}

fn is_column_reference(item: &str) -> bool {
    let mut closing: Option<char> = None;
    for c in item.chars() {
        if let Some(close) = closing {
            if c == close {
                closing = None;
            }
            continue;
        }
        match c {
            '[' => closing = Some(']'),
            '"' | '`' => closing = Some(c),
            '.' => {}
            c if c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '#' | '$') => {}
            _ => return false,
        }
    }
    closing.is_none()
}

/// Last dot-separated part of a column reference, ignoring dots inside quotes.
fn last_segment(item: &str) -> &str {
    let mut closing: Option<u8> = None;
    let mut segment_start = 0;
    for (i, &byte) in item.as_bytes().iter().enumerate() {
        if let Some(close) = closing {
            if byte == close {
                closing = None;
            }
            continue;
        }
        match byte {
            b'[' => closing = Some(b']'),
            b'"' | b'`' => closing = Some(byte),
            b'.' => segment_start = i + 1,
            _ => {}
        }
    }
    &item[segment_start..]
}

fn unquote(name: &str) -> &str {
    let pairs = [('[', ']'), ('"', '"'), ('`', '`'), ('\'', '\'')];
    for (open, close) in pairs {
        if name.len() >= 2 && name.starts_with(open) && name.ends_with(close) {
            return &name[1..name.len() - 1];
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rstest::rstest;

    fn sn(raw: &str) -> SerialNumber {
        SerialNumber::parse(raw).unwrap()
    }

    #[test]
    fn binds_every_token_occurrence() {
        let query = "SELECT Model FROM Units WHERE SN = '#SN#' OR AltSN = '#SN#'";
        let bound = bind_serial(query, "#SN#", &sn("AB123")).unwrap();
        assert_eq!(
            bound,
            "SELECT Model FROM Units WHERE SN = 'AB123' OR AltSN = 'AB123'"
        );
    }

    #[test]
    fn query_without_token_is_returned_unchanged() {
        let query = "SELECT Model FROM Units";
        assert_eq!(bind_serial(query, "#SN#", &sn("AB123")).unwrap(), query);
    }

    #[test]
    fn empty_token_is_rejected() {
        assert_matches!(
            bind_serial("SELECT 1 FROM t", "", &sn("AB123")),
            Err(ServiceError::QueryError(_))
        );
    }

    #[rstest]
    #[case("SELECT Model, Voltage, Current FROM Units WHERE SN='X'", &["Model", "Voltage", "Current"])]
    #[case("select model,voltage from units", &["model", "voltage"])]
    #[case("SELECT TOP 1 Model, Voltage FROM Units", &["Model", "Voltage"])]
    #[case("SELECT DISTINCT TOP (1) Model FROM Units", &["Model"])]
    #[case("SELECT u.Model, [dbo].[Units].[Rated Voltage] FROM dbo.Units u", &["Model", "Rated Voltage"])]
    #[case("SELECT CONCAT(a, ',', b) AS Joined, c FROM t", &["Joined", "c"])]
    #[case("SELECT Model AS [Model Name], Qty as \"Count\" FROM t", &["Model Name", "Count"])]
    #[case("SELECT (SELECT x FROM y) AS Sub, z FROM t WHERE id IN (SELECT id FROM u)", &["Sub", "z"])]
    #[case("SELECT\n  Model,\n  Voltage\nFROM\n  Units", &["Model", "Voltage"])]
    #[case("SELECT COUNT(*) FROM t", &["COUNT(*)"])]
    #[case("SELECT FromDate, Model FROM t", &["FromDate", "Model"])]
    fn parses_select_lists(#[case] query: &str, #[case] expected: &[&str]) {
        let names = select_column_names(query).unwrap();
        assert_eq!(names, expected);
    }

    #[rstest]
    #[case("UPDATE Units SET Model = 'x'")]
    #[case("SELECT Model")]
    #[case("SELECT Model, FROM Units")]
    #[case("SELECT FROM Units")]
    #[case("SELECT * FROM Units")]
    #[case("SELECT u.*, Model FROM Units u")]
    fn rejects_unparseable_queries(#[case] query: &str) {
        assert_matches!(select_column_names(query), Err(ServiceError::QueryError(_)));
    }

    async fn single_row(sql: &str) -> (crate::db::DbPool, QueryResult) {
        let pool = crate::db::establish_connection("sqlite::memory:").await.unwrap();
        let row = crate::db::fetch_first_row(&pool, crate::db::raw_statement(&pool, sql))
            .await
            .unwrap()
            .unwrap();
        (pool, row)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn zips_names_with_row_values() {
        let (_pool, row) = single_row("SELECT 'PX-200', 230").await;
        let fields = zip_row(&names(&["Model", "Voltage"]), &row).unwrap();
        assert_eq!(fields.get("Model"), Some(&FieldValue::from("PX-200")));
        assert_eq!(fields.get("Voltage"), Some(&FieldValue::Integer(230)));
    }

    #[tokio::test]
    async fn extra_row_columns_are_rejected() {
        let (_pool, row) = single_row("SELECT 'PX-200', x'00ff'").await;
        assert_matches!(
            zip_row(&names(&["Model"]), &row),
            Err(ServiceError::QueryError(msg)) if msg.contains("2 columns")
        );
    }

    #[tokio::test]
    async fn missing_row_columns_are_rejected() {
        let (_pool, row) = single_row("SELECT 'PX-200', 230").await;
        assert_matches!(
            zip_row(&names(&["Model", "Voltage", "Current"]), &row),
            Err(ServiceError::QueryError(_))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn plain_column_lists_round_trip(
            names in prop::collection::vec("[A-Za-z][A-Za-z0-9_]{0,12}", 1..8)
        ) {
            let names: Vec<String> = names
                .into_iter()
                .filter(|n| {
                    let upper = n.to_ascii_uppercase();
                    !matches!(upper.as_str(), "FROM" | "AS" | "DISTINCT" | "ALL" | "TOP" | "SELECT")
                })
                .collect();
            prop_assume!(!names.is_empty());

            let query = format!("SELECT {} FROM Units WHERE SN = '#SN#'", names.join(", "));
            let parsed = select_column_names(&query).unwrap();
            prop_assert_eq!(parsed, names);
        }

        #[test]
        fn bound_queries_never_keep_the_token(serial in "[A-Z0-9]{1,20}") {
            let serial = SerialNumber::parse(&serial).unwrap();
            let bound = bind_serial("SELECT a FROM t WHERE sn = '#SN#'", "#SN#", &serial).unwrap();
            prop_assert!(!bound.contains("#SN#"));
            prop_assert!(bound.contains(serial.as_str()));
        }
    }
}
