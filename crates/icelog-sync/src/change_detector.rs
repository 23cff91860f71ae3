//! Builds the incremental extraction query from a persisted high-watermark.

use icelog_core::driver::SqlValue;

/// A parameterised query ready to hand to a [`icelog_core::driver::SourceDriver`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionQuery {
    pub sql_text: String,
    pub parameters: Vec<SqlValue>,
}

/// High-watermark change detection: full scan with no prior watermark,
/// otherwise a strict `>` filter on the watermark column. The strict
/// inequality assumes the watermark column is monotonically non-decreasing
/// per row; sources that update rows without touching it will silently lose
/// those changes.
pub fn build_query(
    source_table: &str,
    watermark_column: &str,
    prior_watermark: Option<&str>,
) -> ExtractionQuery {
    match prior_watermark {
        None => ExtractionQuery {
            sql_text: format!("SELECT * FROM {source_table}"),
            parameters: Vec::new(),
        },
        Some(w) => ExtractionQuery {
            sql_text: format!("SELECT * FROM {source_table} WHERE {watermark_column} > @w"),
            parameters: vec![SqlValue::Timestamp(w.to_string())],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scan_when_no_prior_watermark() {
        let q = build_query("events", "modified", None);
        assert_eq!(q.sql_text, "SELECT * FROM events");
        assert!(q.parameters.is_empty());
    }

    #[test]
    fn incremental_scan_uses_strict_inequality() {
        let q = build_query("events", "modified", Some("2026-01-01T00:00:00Z"));
        assert!(q.sql_text.contains("modified > @w"));
        assert_eq!(q.parameters.len(), 1);
    }
}
