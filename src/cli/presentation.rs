//! CLI presentation: text and json formatters for query listings and configuration.

use crate::config::ObjsyncConfig;
use crate::query::Query;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;

/// Rows of one query, flattened to display strings.
#[derive(Debug, Clone, Serialize)]
pub struct QueryListing {
    pub name: String,
    pub label: Option<String>,
    pub total_items: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryListing {
    /// Snapshot the first `limit` resident rows of `query`, hidden columns excluded.
    pub fn from_query(query: &Query, limit: usize) -> Self {
        let mut columns = query.columns();
        columns.sort_by_key(|c| c.offset);
        let rows = query
            .rows()
            .iter()
            .take(limit)
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.value(&c.name).to_string())
                    .collect()
            })
            .collect();

        Self {
            name: query.name().to_string(),
            label: query.label(),
            total_items: query.total_items(),
            columns: columns
                .into_iter()
                .map(|c| c.label.unwrap_or(c.name))
                .collect(),
            rows,
        }
    }
}

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_query_listing_text(listing: &QueryListing) -> String {
    let title = listing.label.as_deref().unwrap_or(&listing.name);
    let mut out = format!("{}\n\n", format_section_heading(title));
    if listing.rows.is_empty() {
        out.push_str("  No rows.\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(listing.columns.clone());
    for row in &listing.rows {
        table.add_row(row.clone());
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!(
        "Showing {} of {} row(s)\n",
        listing.rows.len(),
        listing.total_items
    ));
    out
}

pub fn format_query_listing_json(listing: &QueryListing) -> String {
    let out = json!({
        "query": listing.name,
        "label": listing.label,
        "total_items": listing.total_items,
        "columns": listing.columns,
        "rows": listing.rows,
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

/// Application queries as a name/label table.
pub fn format_query_names(queries: &[(String, Option<String>)]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Query", "Label"]);
    for (name, label) in queries {
        table.add_row(vec![name.clone(), label.clone().unwrap_or_default()]);
    }
    format!("{}\n", table)
}

pub fn format_config_toml(config: &ObjsyncConfig) -> String {
    toml::to_string_pretty(config).unwrap_or_else(|e| format!("# unable to render: {}", e))
}

pub fn format_validation(errors: &[String]) -> String {
    if errors.is_empty() {
        return format!("{} Configuration is valid\n", "✓".green());
    }
    let mut out = String::new();
    for error in errors {
        out.push_str(&format!("{} {}\n", "✗".red(), error));
    }
    out
}
