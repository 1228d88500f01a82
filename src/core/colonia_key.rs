//! Codec for allow-list colonia keys.
//!
//! Wire form is `<slug>-<zip5>`, e.g. `polanco-11510` or
//! `del-valle-centro-03100`. The slug is the colonia name lower-cased with
//! accents folded and every run of non-alphanumeric characters replaced by a
//! single `-`. Names are compared through the same normalization, so
//! `"Del Valle Centro"` matches `del-valle-centro`.

use crate::domain::model::{ColoniaKey, ZipCode};
use crate::utils::error::{EligibilityError, Result};
use std::collections::HashSet;

/// Folds case, accents and separators so two spellings of a colonia compare equal.
pub fn normalize_colonia_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        };

        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }

    slug
}

pub fn encode(key: &ColoniaKey) -> String {
    format!("{}-{}", normalize_colonia_name(&key.colonia_name), key.zip_code)
}

pub fn decode(raw: &str) -> Result<ColoniaKey> {
    let malformed = |reason: &str| EligibilityError::InvalidConfigValueError {
        field: "colonia_keys".to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let (name, zip) = raw
        .trim()
        .rsplit_once('-')
        .ok_or_else(|| malformed("missing '-<zip>' suffix"))?;
    let zip_code = ZipCode::parse(zip).map_err(|_| malformed("suffix is not a 5 digit zip code"))?;
    let colonia_name = normalize_colonia_name(name);
    if colonia_name.is_empty() {
        return Err(malformed("empty colonia name"));
    }

    Ok(ColoniaKey {
        colonia_name,
        zip_code,
    })
}

/// Result of decoding a whole allow-list.
#[derive(Debug, Clone, Default)]
pub struct DecodedAllowlist {
    /// Unique by (zip, normalized name), in first-seen order.
    pub keys: Vec<ColoniaKey>,
    pub rejected: Vec<String>,
}

impl DecodedAllowlist {
    pub fn zip_codes(&self) -> HashSet<&ZipCode> {
        self.keys.iter().map(|k| &k.zip_code).collect()
    }

    pub fn keys_for_zip<'a>(&'a self, zip: &'a ZipCode) -> impl Iterator<Item = &'a ColoniaKey> {
        self.keys.iter().filter(move |k| &k.zip_code == zip)
    }

    pub fn contains(&self, zip: &ZipCode, colonia_name: &str) -> bool {
        let wanted = normalize_colonia_name(colonia_name);
        self.keys_for_zip(zip).any(|k| k.colonia_name == wanted)
    }
}

/// Decodes every entry, skipping (and logging) malformed ones.
pub fn decode_all<S: AsRef<str>>(raw_keys: &[S]) -> DecodedAllowlist {
    let mut decoded = DecodedAllowlist::default();
    let mut seen = HashSet::new();

    for raw in raw_keys {
        let raw = raw.as_ref();
        match decode(raw) {
            Ok(key) => {
                if seen.insert((key.zip_code.clone(), key.colonia_name.clone())) {
                    decoded.keys.push(key);
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Skipping malformed allow-list entry: {}", e);
                decoded.rejected.push(raw.to_string());
            }
        }
    }

    decoded
}
