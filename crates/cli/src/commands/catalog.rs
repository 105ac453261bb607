use std::path::Path;

use basketbot_core::catalog::DEFAULT_CURRENCY;
use basketbot_core::config::{AppConfig, LoadOptions};
use basketbot_core::Catalog;
use serde::Serialize;

use crate::commands::{escape_json, CommandResult};

#[derive(Debug, Serialize)]
struct CatalogEntry<'a> {
    code: String,
    category: &'static str,
    name: &'a str,
    price: u32,
    currency: &'a str,
    unit: Option<&'a str>,
}

/// Lists the catalog from `path` when given, otherwise from the configured source.
pub fn run(path: Option<&Path>, json_output: bool) -> CommandResult {
    let catalog = match path {
        Some(path) => Catalog::load(path, DEFAULT_CURRENCY),
        None => match AppConfig::load(LoadOptions::default()) {
            Ok(config) => config.catalog.load(),
            Err(error) => {
                return CommandResult::failure(
                    "catalog",
                    "config_validation",
                    format!("configuration issue: {error}"),
                    2,
                );
            }
        },
    };

    let catalog = match catalog {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure("catalog", "catalog_load", error.to_string(), 2);
        }
    };

    let output = if json_output { render_json(&catalog) } else { render_human(&catalog) };
    CommandResult { exit_code: 0, output }
}

fn entries(catalog: &Catalog) -> Vec<CatalogEntry<'_>> {
    catalog
        .categories()
        .iter()
        .flat_map(|&category| {
            catalog.codes(category).map(move |(code, item)| CatalogEntry {
                code: code.to_string(),
                category: category.as_str(),
                name: &item.name,
                price: item.unit_price,
                currency: catalog.currency(),
                unit: item.unit.as_deref(),
            })
        })
        .collect()
}

fn render_json(catalog: &Catalog) -> String {
    serde_json::to_string_pretty(&entries(catalog)).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"catalog\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    })
}

fn render_human(catalog: &Catalog) -> String {
    let mut lines =
        vec![format!("catalog: {} products, prices in {}", catalog.len(), catalog.currency())];
    for &category in catalog.categories() {
        lines.push(format!("{}:", category.label()));
        for (code, item) in catalog.codes(category) {
            lines.push(format!("  {:<5} {}", code.to_string(), item.label(catalog.currency())));
        }
    }
    lines.join("\n")
}
