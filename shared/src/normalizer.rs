use log::{debug, warn};
use regex::Regex;
use serde_json::{Map, Value};

use crate::waste::{ClassificationResult, NormalizationOutcome, WasteCategory, UNKNOWN_IMAGE_ID};

/// Confidence given to a recovered category when the text carries no
/// `confidence` field at all. This is dashboard policy, not a model output.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

const ANSWER_MARKER: &str = r"\*Answer\*:\s*";
const NO_FOOD_FLAG: &str = r#"contains_food"\s*:\s*false\b"#;
const FOOD_FLAG: &str = r#"contains_food"\s*:\s*true\b"#;
const NO_WASTE_FLAG: &str = r#"is_waste"\s*:\s*false\b"#;
const CATEGORY_GROUP: &str = r#"(?s)food_type"\s*:\s*"([^"]*)"(.*?)"name"\s*:\s*"([^"]*)"(.*?)"explanation"\s*:\s*"([^"]*)""#;
const CONFIDENCE_FIELD: &str = r#"confidence"\s*:\s*"?([^,}\s"]*)"#;
const FOOD_TYPE_FIELD: &str = r#"food_type"\s*:\s*"([^"]*)""#;
const NAME_FIELD: &str = r#""name"\s*:\s*"([^"]*)""#;
const EXPLANATION_FIELD: &str = r#"explanation"\s*:\s*"([^"]*)""#;
const TIMESTAMP_FIELD: &str = r#""timestamp"\s*:\s*"([^"]*)""#;
const IMAGE_ID_FIELD: &str = r#""image_id"\s*:\s*"([^"]*)""#;

type TextStrategy = fn(&ResponseNormalizer, &str, Option<&str>) -> Option<NormalizationOutcome>;

/// Turns the waste classifier's loosely structured output into a
/// [`NormalizationOutcome`].
///
/// Objects are first checked against the canonical shape. Text (and objects
/// that miss the shape) then goes through, in order:
/// - embedded JSON after an `*Answer*:` marker or at the end of the text
/// - textual sniffing of the `contains_food` / `is_waste` flags
/// - field-level extraction of `(food_type, name, confidence, explanation)` groups
///
/// The first strategy that produces an outcome wins. Nothing here fails:
/// text nobody can interpret becomes [`NormalizationOutcome::Unparseable`].
pub struct ResponseNormalizer {
    answer_marker: Regex,
    no_food_flag: Regex,
    food_flag: Regex,
    no_waste_flag: Regex,
    category_group: Regex,
    confidence_field: Regex,
    food_type_field: Regex,
    name_field: Regex,
    explanation_field: Regex,
    timestamp_field: Regex,
    image_id_field: Regex,
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("Valid regex pattern");
        Self {
            answer_marker: compile(ANSWER_MARKER),
            no_food_flag: compile(NO_FOOD_FLAG),
            food_flag: compile(FOOD_FLAG),
            no_waste_flag: compile(NO_WASTE_FLAG),
            category_group: compile(CATEGORY_GROUP),
            confidence_field: compile(CONFIDENCE_FIELD),
            food_type_field: compile(FOOD_TYPE_FIELD),
            name_field: compile(NAME_FIELD),
            explanation_field: compile(EXPLANATION_FIELD),
            timestamp_field: compile(TIMESTAMP_FIELD),
            image_id_field: compile(IMAGE_ID_FIELD),
        }
    }

    /// Normalizes the `classification` field of a backend response.
    ///
    /// `fallback_image_id` (usually the uploaded file name) is used when the
    /// payload names no image.
    pub fn normalize(&self, raw: &Value, fallback_image_id: Option<&str>) -> NormalizationOutcome {
        match raw {
            Value::Object(object) => {
                if let Some(outcome) = self.direct_shape(object, fallback_image_id) {
                    debug!("Classification matched the direct shape");
                    return outcome;
                }
                let text = Value::Object(object.clone()).to_string();
                self.normalize_text(&text, fallback_image_id)
            }
            Value::String(text) => self.normalize_text(text, fallback_image_id),
            other => {
                debug!("Classification payload is neither text nor an object: {}", other);
                NormalizationOutcome::Unparseable
            }
        }
    }

    pub fn normalize_text(&self, text: &str, fallback_image_id: Option<&str>) -> NormalizationOutcome {
        let strategies: [(&str, TextStrategy); 3] = [
            ("embedded json", Self::embedded_json),
            ("flag sniffing", Self::sniff_flags),
            ("field extraction", Self::extract_fields),
        ];

        for (name, strategy) in strategies {
            if let Some(outcome) = strategy(self, text, fallback_image_id) {
                debug!("Classification recovered by {}: {}", name, outcome.summary());
                return outcome;
            }
        }

        warn!("Could not interpret classification result ({} bytes)", text.len());
        NormalizationOutcome::Unparseable
    }

    fn direct_shape(
        &self,
        object: &Map<String, Value>,
        fallback_image_id: Option<&str>,
    ) -> Option<NormalizationOutcome> {
        let categories = object.get("categories")?.as_array()?;
        let timestamp = object.get("timestamp")?.as_str()?;

        let categories: Vec<WasteCategory> = categories.iter().map(category_from_value).collect();
        let has_categories = !categories.is_empty();
        let image_id = object
            .get("image_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| fallback_image_id.map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_IMAGE_ID.to_string());

        let result = ClassificationResult {
            timestamp: timestamp.to_string(),
            image_id,
            contains_food: object
                .get("contains_food")
                .and_then(Value::as_bool)
                .unwrap_or(has_categories),
            is_waste: object
                .get("is_waste")
                .and_then(Value::as_bool)
                .unwrap_or(has_categories),
            categories,
        };

        for violation in result.check_invariants() {
            debug!("Classification for {} is off-shape: {}", result.image_id, violation);
        }

        Some(if !result.contains_food {
            NormalizationOutcome::NoFood
        } else if !result.is_waste {
            NormalizationOutcome::FoodNoWaste
        } else {
            NormalizationOutcome::Classified(result)
        })
    }

    fn embedded_json(&self, text: &str, fallback_image_id: Option<&str>) -> Option<NormalizationOutcome> {
        if let Some(marker) = self.answer_marker.find(text) {
            let answer = &text[marker.end()..];
            match first_json_object(answer) {
                Some(object) => {
                    if let Some(outcome) = self.direct_shape(&object, fallback_image_id) {
                        return Some(outcome);
                    }
                }
                None => debug!("Answer marker present but no JSON object follows it"),
            }
        }

        let trimmed = text.trim_end();
        if !trimmed.ends_with('}') {
            return None;
        }
        // Prose may contain stray braces, so try every opening brace until
        // the remainder parses as one object.
        trimmed
            .char_indices()
            .filter(|(_, c)| *c == '{')
            .filter_map(|(start, _)| serde_json::from_str::<Map<String, Value>>(&trimmed[start..]).ok())
            .find_map(|object| self.direct_shape(&object, fallback_image_id))
    }

    fn sniff_flags(&self, text: &str, _fallback_image_id: Option<&str>) -> Option<NormalizationOutcome> {
        if self.no_food_flag.is_match(text) {
            return Some(NormalizationOutcome::NoFood);
        }
        if self.food_flag.is_match(text) && self.no_waste_flag.is_match(text) {
            return Some(NormalizationOutcome::FoodNoWaste);
        }
        None
    }

    fn extract_fields(&self, text: &str, fallback_image_id: Option<&str>) -> Option<NormalizationOutcome> {
        let mut categories = self.category_groups(text);
        if categories.is_empty() {
            categories.extend(self.scattered_category(text));
        }
        if categories.is_empty() {
            return None;
        }

        let timestamp = self.capture(&self.timestamp_field, text);
        let image_id = self.capture(&self.image_id_field, text);
        Some(NormalizationOutcome::Classified(ClassificationResult::synthesized(
            categories,
            timestamp,
            image_id,
            fallback_image_id,
        )))
    }

    fn category_groups(&self, text: &str) -> Vec<WasteCategory> {
        let has_confidence = self.confidence_field.is_match(text);
        self.category_group
            .captures_iter(text)
            .map(|group| {
                let between = |index: usize| group.get(index).map_or("", |m| m.as_str());
                let confidence = self
                    .confidence_field
                    .captures(between(4))
                    .or_else(|| self.confidence_field.captures(between(2)))
                    .map(|c| parse_confidence(c.get(1).map_or("", |m| m.as_str())))
                    .unwrap_or(if has_confidence { 0.0 } else { DEFAULT_CONFIDENCE });

                WasteCategory {
                    food_type: between(1).to_string(),
                    name: between(3).to_string(),
                    confidence,
                    explanation: between(5).to_string(),
                }
            })
            .collect()
    }

    // Last resort for fields that appear out of order: one category from the
    // first occurrence of each field.
    fn scattered_category(&self, text: &str) -> Option<WasteCategory> {
        let food_type = self.capture(&self.food_type_field, text)?;
        let name = self.capture(&self.name_field, text)?;
        let explanation = self.capture(&self.explanation_field, text)?;
        let confidence = self
            .capture(&self.confidence_field, text)
            .map_or(DEFAULT_CONFIDENCE, |raw| parse_confidence(&raw));

        Some(WasteCategory {
            food_type: or_unknown(food_type),
            name: or_unknown(name),
            confidence,
            explanation,
        })
    }

    fn capture(&self, pattern: &Regex, text: &str) -> Option<String> {
        pattern
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    let mut values = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match values.next()? {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn category_from_value(value: &Value) -> WasteCategory {
    let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let confidence = match value.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_confidence(s),
        _ => 0.0,
    };
    WasteCategory {
        food_type: text("food_type"),
        name: text("name"),
        confidence,
        explanation: text("explanation"),
    }
}

fn parse_confidence(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite())
        .unwrap_or(0.0)
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value
    }
}
