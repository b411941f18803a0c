use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Image id reported when neither the backend nor the caller supplied one.
pub const UNKNOWN_IMAGE_ID: &str = "unknown.jpg";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasteCategory {
    pub food_type: String,
    pub name: String,
    pub confidence: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub timestamp: String,
    pub image_id: String,
    pub contains_food: bool,
    pub is_waste: bool,
    pub categories: Vec<WasteCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InvariantViolation {
    #[strum(serialize = "categories present although no food was detected")]
    CategoriesWithoutFood,
    #[strum(serialize = "waste flagged although no food was detected")]
    WasteWithoutFood,
    #[strum(serialize = "categories present although the food is not waste")]
    CategoriesWithoutWaste,
    #[strum(serialize = "waste flagged without any category")]
    WasteWithoutCategories,
}

impl ClassificationResult {
    /// Builds a waste result out of categories recovered from free text.
    ///
    /// The timestamp defaults to now and the image id falls back to the
    /// caller's file name, then to [`UNKNOWN_IMAGE_ID`].
    pub fn synthesized(
        categories: Vec<WasteCategory>,
        timestamp: Option<String>,
        image_id: Option<String>,
        fallback_image_id: Option<&str>,
    ) -> Self {
        let image_id = image_id
            .filter(|id| !id.is_empty())
            .or_else(|| fallback_image_id.map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_IMAGE_ID.to_string());

        Self {
            timestamp: timestamp.unwrap_or_else(|| Utc::now().to_rfc3339()),
            image_id,
            contains_food: true,
            is_waste: true,
            categories,
        }
    }

    /// Lists the data-model invariants this result breaks. The result itself
    /// is never corrected; callers only log what comes back.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        if !self.contains_food {
            if !self.categories.is_empty() {
                violations.push(InvariantViolation::CategoriesWithoutFood);
            }
            if self.is_waste {
                violations.push(InvariantViolation::WasteWithoutFood);
            }
        } else if !self.is_waste && !self.categories.is_empty() {
            violations.push(InvariantViolation::CategoriesWithoutWaste);
        }
        if self.is_waste && self.categories.is_empty() {
            violations.push(InvariantViolation::WasteWithoutCategories);
        }
        violations
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizationOutcome {
    NoFood,
    FoodNoWaste,
    Classified(ClassificationResult),
    Unparseable,
}

impl NormalizationOutcome {
    pub fn summary(&self) -> &'static str {
        match self {
            NormalizationOutcome::NoFood => "No food detected in the image",
            NormalizationOutcome::FoodNoWaste => "Food detected, but no waste found",
            NormalizationOutcome::Classified(_) => "Waste classification completed",
            NormalizationOutcome::Unparseable => "Could not interpret classification result",
        }
    }

    pub fn classification(&self) -> Option<&ClassificationResult> {
        match self {
            NormalizationOutcome::Classified(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, NormalizationOutcome::Unparseable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence >= 0.8 {
            ConfidenceBand::High
        } else if confidence >= 0.5 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Renders a 0..1 confidence as a rounded percentage, e.g. `0.874` -> `"87%"`.
pub fn format_confidence(confidence: f64) -> String {
    format!("{}%", (confidence * 100.0).round() as i64)
}
