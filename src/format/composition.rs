//! Hill-ordered compositions.

use indexmap::IndexMap;
use serde_json::Value;

/// Converts an upstream composition object into a Hill-ordered mapping.
///
/// Hill order puts carbon first and hydrogen second when carbon is present,
/// then every other element alphabetically. Without carbon all elements,
/// hydrogen included, are alphabetical. Non-numeric counts are dropped.
#[must_use]
pub fn hill_ordered(raw: &Value) -> Option<IndexMap<String, f64>> {
    let obj = raw.as_object()?;

    let mut entries: Vec<(&str, f64)> = obj
        .iter()
        .filter_map(|(element, count)| count.as_f64().map(|c| (element.as_str(), c)))
        .collect();

    let has_carbon = entries.iter().any(|(e, _)| *e == "C");
    entries.sort_by(|(a, _), (b, _)| hill_rank(a, has_carbon).cmp(&hill_rank(b, has_carbon)));

    Some(
        entries
            .into_iter()
            .map(|(e, c)| (e.to_string(), c))
            .collect(),
    )
}

fn hill_rank(element: &str, has_carbon: bool) -> (u8, &str) {
    match element {
        "C" if has_carbon => (0, element),
        "H" if has_carbon => (1, element),
        _ => (2, element),
    }
}
