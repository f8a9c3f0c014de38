//! Catalog payload normalization.
//!
//! Upstream card catalogs disagree on field names and nesting. This module
//! is the single place that knowledge lives: a pure function from a raw
//! catalog record to the fixed [`CardSummary`] shape the rest of the system
//! renders. Missing fields degrade to placeholders rather than failing the
//! whole record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::card::CardId;

/// Fixed display schema for a catalog card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub card_id: CardId,
    pub name: String,
    pub set_name: String,
    pub number: Option<String>,
    pub rarity: Option<String>,
    pub image_url: Option<String>,
}

const UNKNOWN_NAME: &str = "Unknown card";
const UNKNOWN_SET: &str = "Unknown set";

/// Map an arbitrary catalog record onto [`CardSummary`].
///
/// Pure: no lookups, no IO. Field resolution tries the known upstream
/// spellings in order and falls back to a placeholder.
pub fn normalize_card(card_id: &CardId, raw: &Value) -> CardSummary {
    let name = first_string(raw, &["name", "cardName", "title"])
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let set_name = nested_string(raw, "set", "name")
        .or_else(|| first_string(raw, &["setName", "set_name", "set"]))
        .unwrap_or_else(|| UNKNOWN_SET.to_string());

    let number = first_string(raw, &["number", "collectorNumber", "collector_number"]);

    let rarity = first_string(raw, &["rarity"]);

    let image_url = nested_string(raw, "images", "large")
        .or_else(|| nested_string(raw, "images", "small"))
        .or_else(|| first_string(raw, &["imageUrl", "image_url"]));

    CardSummary {
        card_id: card_id.clone(),
        name,
        set_name,
        number,
        rarity,
        image_url,
    }
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .find_map(as_nonempty_string)
}

fn nested_string(raw: &Value, outer: &str, inner: &str) -> Option<String> {
    raw.get(outer)
        .and_then(|v| v.get(inner))
        .and_then(as_nonempty_string)
}

fn as_nonempty_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        // Collector numbers sometimes arrive as bare integers.
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
