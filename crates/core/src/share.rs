//! Share links
//!
//! A preset travels as base64 of a compact JSON object:
//! `{"n": name, "m": meal, "i": [{"n": item, "e": 0|1}]}`. Tokens are
//! written URL-safe without padding; any base64 flavour is accepted back.
//! Decoding fails closed: anything malformed is `None`.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{validate_item_name, Item, MealType, Preset};

/// Name given to imported presets that carry none
pub const DEFAULT_SHARED_NAME: &str = "Shared Menu";

/// Query parameter carrying the token
pub const IMPORT_PARAM: &str = "import";

#[derive(Serialize, Deserialize)]
struct SharedPreset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    m: Option<String>,
    #[serde(default)]
    i: Vec<SharedItem>,
}

#[derive(Serialize, Deserialize)]
struct SharedItem {
    n: String,
    #[serde(default)]
    e: Value,
}

/// Encode a preset's name, meal tag and items (ids are not shared)
pub fn encode(preset: &Preset) -> Result<String> {
    let shared = SharedPreset {
        n: Some(preset.name.clone()),
        m: Some(preset.meal_type.as_str().to_string()),
        i: preset
            .items
            .iter()
            .map(|item| SharedItem {
                n: item.name.clone(),
                e: Value::from(u8::from(item.enabled)),
            })
            .collect(),
    };
    let json = serde_json::to_vec(&shared)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a token into a fresh preset with new ids
pub fn decode(token: &str) -> Option<Preset> {
    let bytes = match STANDARD_NO_PAD.decode(normalize(token)) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Share token is not base64: {}", e);
            return None;
        }
    };
    let shared: SharedPreset = match serde_json::from_slice(&bytes) {
        Ok(shared) => shared,
        Err(e) => {
            debug!("Share token is not a preset: {}", e);
            return None;
        }
    };

    let batch = Uuid::new_v4().simple();
    let mut items = Vec::with_capacity(shared.i.len());
    for (idx, item) in shared.i.into_iter().enumerate() {
        let name = validate_item_name(&item.n).ok()?;
        items.push(Item {
            id: format!("imp_{}_{}", batch, idx),
            name,
            enabled: item.e.as_u64() == Some(1),
        });
    }

    let name = shared
        .n
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_SHARED_NAME.to_string());
    let meal_type = shared
        .m
        .and_then(|m| m.parse().ok())
        .unwrap_or(MealType::All);

    Some(Preset {
        id: format!("imported_{}", batch),
        name,
        meal_type,
        items,
    })
}

/// Map every base64 flavour (and query-string mangling) onto standard, unpadded
fn normalize(token: &str) -> String {
    token
        .trim()
        .replace("%2B", "+")
        .replace("%2F", "/")
        .replace("%3D", "=")
        .chars()
        .filter_map(|c| match c {
            '-' => Some('+'),
            '_' => Some('/'),
            ' ' => Some('+'),
            '=' => None,
            c => Some(c),
        })
        .collect()
}

/// Build a link that imports `preset` when opened
pub fn share_url(base: &str, preset: &Preset) -> Result<String> {
    let token = encode(preset)?;
    let separator = if base.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}={}", base, separator, IMPORT_PARAM, token))
}

/// Pull the token out of a share link, or accept a bare token
pub fn import_token(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let Some((_, query)) = input.split_once('?') else {
        return Some(input.to_string());
    };
    query
        .split('#')
        .next()
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == IMPORT_PARAM)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
