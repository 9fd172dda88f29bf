//! Chart/Table Extractor
//!
//! Projects successful analytics payloads into a generic time-series
//! chart (one shared date axis, named numeric series) or a generic
//! table, using declarative per-endpoint-family field maps.
//!
//! The provider encodes trend arrays either as proper JSON arrays or as
//! bracket-delimited pseudo-arrays of quoted values (`{"a","b"}`); both
//! are tolerated. Data is never silently dropped over a cosmetic
//! formatting issue: a missing or unparsable date axis is synthesized
//! from sequential hourly timestamps instead of failing the extraction.

use chrono::{Duration, Utc};
use serde_json::Value;

use crate::response::{ChartData, Dataset, TableData, TrendValue};

/// Extraction result: a chart, a table, or nothing to visualize
#[derive(Clone, Debug)]
pub enum Visual {
    Chart(ChartData),
    Table(TableData),
}

type FieldMap = &'static [(&'static str, &'static str, &'static str)];

const ANALYTICS_FIELDS: FieldMap = &[
    ("volume_trend", "Volume", "var(--chart-1)"),
    ("sales_trend", "Sales", "var(--chart-2)"),
    ("transactions_trend", "Transactions", "var(--chart-3)"),
    ("transfers_trend", "Transfers", "var(--chart-4)"),
];

const HOLDERS_FIELDS: FieldMap = &[
    ("volume_trend", "Volume", "var(--chart-1)"),
    ("sales_trend", "Sales", "var(--chart-2)"),
    ("transactions_trend", "Transactions", "var(--chart-3)"),
];

const TRADERS_FIELDS: FieldMap = &[
    ("traders_trend", "Total Traders", "var(--chart-1)"),
    ("traders_buyers_trend", "Buyers", "var(--chart-2)"),
    ("traders_sellers_trend", "Sellers", "var(--chart-3)"),
];

const SCORES_FIELDS: FieldMap = &[
    ("market_cap_trend", "Market Cap", "var(--chart-1)"),
    ("marketstate_trend", "Market State", "var(--chart-2)"),
];

const WASHTRADE_FIELDS: FieldMap = &[
    ("washtrade_volume_trend", "Washtrade Volume", "var(--chart-1)"),
    ("washtrade_suspect_sales_trend", "Suspect Sales", "var(--chart-2)"),
    ("washtrade_assets_trend", "Washtrade Assets", "var(--chart-3)"),
    (
        "washtrade_suspect_transactions_trend",
        "Suspect Transactions",
        "var(--chart-4)",
    ),
    ("washtrade_wallets_trend", "Washtrade Wallets", "var(--chart-5)"),
];

fn field_map(endpoint: &str) -> FieldMap {
    match endpoint {
        "market_analytics" | "nft_analytics" => ANALYTICS_FIELDS,
        "market_holders" => HOLDERS_FIELDS,
        "market_traders" | "nft_traders" => TRADERS_FIELDS,
        "market_scores" => SCORES_FIELDS,
        "market_washtrade" | "nft_washtrade" => WASHTRADE_FIELDS,
        _ => &[],
    }
}

fn is_table_endpoint(endpoint: &str) -> bool {
    matches!(endpoint, "collection_whales" | "floor_price")
}

/// Split a `{a,b,c}` pseudo-array into trimmed, unquoted elements
fn pseudo_elements(raw: &str) -> Option<Vec<String>> {
    let inner = raw.strip_prefix('{')?.strip_suffix('}')?;
    Some(
        inner
            .split(',')
            .map(|item| item.trim().replace('"', ""))
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

/// Parse the shared date axis. Values are always kept as strings.
fn parse_string_axis(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(raw) => {
            if let Some(elements) = pseudo_elements(raw) {
                return elements;
            }
            serde_json::from_str::<Vec<String>>(raw).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

fn coerce(element: &str) -> TrendValue {
    element
        .parse::<f64>()
        .map_or_else(|_| TrendValue::Text(element.to_string()), TrendValue::Number)
}

/// Parse a numeric trend field. Elements that fail numeric coercion keep
/// their original string form.
fn parse_trend_values(value: &Value) -> Vec<TrendValue> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Number(n) => TrendValue::Number(n.as_f64().unwrap_or(0.0)),
                Value::String(s) => coerce(s),
                other => TrendValue::Text(other.to_string()),
            })
            .collect(),
        Value::String(raw) => {
            if let Some(elements) = pseudo_elements(raw) {
                return elements.iter().map(|e| coerce(e)).collect();
            }
            match serde_json::from_str::<Vec<Value>>(raw) {
                Ok(items) => parse_trend_values(&Value::Array(items)),
                Err(_) => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// N sequential hourly timestamps ending now, used when the provider
/// omits or mangles the date axis
fn synthesize_axis(len: usize) -> Vec<String> {
    let now = Utc::now();
    (0..len)
        .map(|i| {
            let offset = (len - 1 - i) as i64;
            (now - Duration::hours(offset))
                .format("%Y-%m-%dT%H:00:00Z")
                .to_string()
        })
        .collect()
}

/// Project a raw analytics payload into a chart or table. Returns `None`
/// when nothing can be derived; the composer treats that as "no
/// visualization for this answer", not as an error.
pub fn extract(endpoint: &str, payload: &Value) -> Option<Visual> {
    if is_table_endpoint(endpoint) {
        return extract_table(endpoint, payload).map(Visual::Table);
    }
    extract_chart(endpoint, payload).map(Visual::Chart)
}

fn extract_chart(endpoint: &str, payload: &Value) -> Option<ChartData> {
    let fields = field_map(endpoint);
    if fields.is_empty() {
        return None;
    }

    let row = payload.get("data")?.get(0)?;

    let mut datasets = Vec::new();
    for (field, label, color) in fields {
        let Some(raw) = row.get(*field) else { continue };
        let data = parse_trend_values(raw);
        // Absent or empty fields are omitted, never invented.
        if !data.is_empty() {
            datasets.push(Dataset {
                label: (*label).to_string(),
                data,
                color: (*color).to_string(),
            });
        }
    }

    if datasets.is_empty() {
        return None;
    }

    let mut block_dates = row.get("block_dates").map(parse_string_axis).unwrap_or_default();
    if block_dates.is_empty() {
        let len = datasets.iter().map(|d| d.data.len()).max().unwrap_or(0);
        tracing::warn!(endpoint, len, "date axis missing or unparsable, synthesizing");
        block_dates = synthesize_axis(len);
    }

    // Every series must align with the shared axis: zero-fill short
    // series, truncate overruns.
    let axis_len = block_dates.len();
    for dataset in &mut datasets {
        dataset.data.resize(axis_len, TrendValue::Number(0.0));
    }

    Some(ChartData {
        block_dates,
        datasets,
    })
}

fn extract_table(endpoint: &str, payload: &Value) -> Option<TableData> {
    let rows = payload.get("data")?.as_array()?;
    let first = rows.first()?.as_object()?;

    let headers: Vec<String> = first.keys().cloned().collect();
    let body: Vec<Vec<Value>> = rows
        .iter()
        .filter_map(Value::as_object)
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    let title = match endpoint {
        "collection_whales" => "Collection Whales",
        "floor_price" => "Floor Prices",
        other => other,
    };

    Some(TableData {
        title: title.to_string(),
        headers,
        rows: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pseudo_array_axis_and_trend() {
        let payload = json!({
            "data": [{
                "block_dates": "{\"2024-01-01\",\"2024-01-02\"}",
                "volume_trend": "{100,200}"
            }]
        });

        let Some(Visual::Chart(chart)) = extract("market_analytics", &payload) else {
            panic!("expected chart");
        };
        assert_eq!(chart.block_dates, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(chart.datasets.len(), 1);
        assert_eq!(chart.datasets[0].label, "Volume");
        assert_eq!(
            chart.datasets[0].data,
            vec![TrendValue::Number(100.0), TrendValue::Number(200.0)]
        );
    }

    #[test]
    fn test_proper_json_arrays_tolerated() {
        let payload = json!({
            "data": [{
                "block_dates": ["2024-01-01", "2024-01-02"],
                "sales_trend": [3, 4]
            }]
        });

        let Some(Visual::Chart(chart)) = extract("market_analytics", &payload) else {
            panic!("expected chart");
        };
        assert_eq!(chart.datasets[0].label, "Sales");
        assert_eq!(
            chart.datasets[0].data,
            vec![TrendValue::Number(3.0), TrendValue::Number(4.0)]
        );
    }

    #[test]
    fn test_empty_trend_fields_omitted() {
        let payload = json!({
            "data": [{
                "block_dates": ["2024-01-01"],
                "volume_trend": "{}",
                "sales_trend": "{7}"
            }]
        });

        let Some(Visual::Chart(chart)) = extract("market_analytics", &payload) else {
            panic!("expected chart");
        };
        // No zero-length series may ever appear.
        assert_eq!(chart.datasets.len(), 1);
        assert_eq!(chart.datasets[0].label, "Sales");
    }

    #[test]
    fn test_no_series_means_no_chart() {
        let payload = json!({"data": [{"block_dates": ["2024-01-01"]}]});
        assert!(extract("market_analytics", &payload).is_none());
    }

    #[test]
    fn test_series_zero_filled_to_axis_length() {
        let payload = json!({
            "data": [{
                "block_dates": ["d1", "d2", "d3"],
                "volume_trend": "{1,2}"
            }]
        });

        let Some(Visual::Chart(chart)) = extract("market_analytics", &payload) else {
            panic!("expected chart");
        };
        for dataset in &chart.datasets {
            assert_eq!(dataset.data.len(), chart.block_dates.len());
        }
        assert_eq!(chart.datasets[0].data[2], TrendValue::Number(0.0));
    }

    #[test]
    fn test_missing_axis_synthesized() {
        let payload = json!({
            "data": [{ "volume_trend": "{5,6,7}" }]
        });

        let Some(Visual::Chart(chart)) = extract("market_analytics", &payload) else {
            panic!("expected chart");
        };
        assert_eq!(chart.block_dates.len(), 3);
        assert_eq!(chart.datasets[0].data.len(), 3);
    }

    #[test]
    fn test_non_numeric_elements_kept_as_text() {
        let values = parse_trend_values(&json!("{12,n/a,9}"));
        assert_eq!(
            values,
            vec![
                TrendValue::Number(12.0),
                TrendValue::Text("n/a".into()),
                TrendValue::Number(9.0)
            ]
        );
    }

    #[test]
    fn test_washtrade_family_maps_five_series() {
        let payload = json!({
            "data": [{
                "block_dates": ["d1"],
                "washtrade_volume_trend": "{1}",
                "washtrade_suspect_sales_trend": "{2}",
                "washtrade_assets_trend": "{3}",
                "washtrade_suspect_transactions_trend": "{4}",
                "washtrade_wallets_trend": "{5}"
            }]
        });

        let Some(Visual::Chart(chart)) = extract("market_washtrade", &payload) else {
            panic!("expected chart");
        };
        assert_eq!(chart.datasets.len(), 5);
        assert_eq!(chart.datasets[4].label, "Washtrade Wallets");
    }

    #[test]
    fn test_floor_price_projects_table() {
        let payload = json!({
            "data": [
                {"collection": "Pudgy Penguins", "floor_price": 9.5, "marketplace": "opensea"},
                {"collection": "Pudgy Penguins", "floor_price": 9.4, "marketplace": "blur"}
            ]
        });

        let Some(Visual::Table(table)) = extract("floor_price", &payload) else {
            panic!("expected table");
        };
        assert_eq!(table.title, "Floor Prices");
        assert_eq!(table.headers.len(), 3);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_unknown_endpoint_yields_nothing() {
        let payload = json!({"data": [{"block_dates": ["d1"], "volume_trend": "{1}"}]});
        assert!(extract("wallet_label", &payload).is_none());
    }
}
