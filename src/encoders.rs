use crate::errors::{PredictionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Weekday used when a request carries a name outside the trained set.
/// The training pipeline silently mapped unknown weekdays to Wednesday;
/// product and location are fatal instead. Preserve the asymmetry.
pub const DEFAULT_WEEKDAY: &str = "Wednesday";
const DEFAULT_WEEKDAY_INDEX: u32 = 2;

/// Trained label vocabulary for one categorical field. A value's code is
/// its position in the class list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn encode(&self, field: &'static str, value: &str) -> Result<f64> {
        self.classes
            .iter()
            .position(|class| class == value)
            .map(|idx| idx as f64)
            .ok_or_else(|| PredictionError::unknown_category(field, value))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Plain name -> index mapping (the weekday "encoder" was never a fitted
/// label encoder in training, just a dict).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedMapping {
    pub mapping: HashMap<String, u32>,
}

impl FixedMapping {
    pub fn weekdays() -> Self {
        let mapping = crate::models::WEEKDAY_NAMES
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), idx as u32))
            .collect();
        Self { mapping }
    }

    /// Unknown names fall back to Wednesday, silently.
    pub fn encode_or_default(&self, value: &str) -> f64 {
        let index = self.mapping.get(value).copied().unwrap_or_else(|| {
            self.mapping
                .get(DEFAULT_WEEKDAY)
                .copied()
                .unwrap_or(DEFAULT_WEEKDAY_INDEX)
        });
        index as f64
    }

    pub fn contains(&self, value: &str) -> bool {
        self.mapping.contains_key(value)
    }
}

/// One entry of the encoders artifact. The artifact mixes two shapes, so
/// each field is dispatched on its expected variant at load time instead
/// of probing shapes at prediction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Encoder {
    Label(LabelEncoder),
    Fixed(FixedMapping),
}

impl Encoder {
    fn as_label(&self, field: &'static str) -> Result<&LabelEncoder> {
        match self {
            Encoder::Label(encoder) => Ok(encoder),
            Encoder::Fixed(_) => Err(PredictionError::validation(format!(
                "encoder for {field} must be a label encoder"
            ))),
        }
    }

    fn as_fixed(&self, field: &'static str) -> Result<&FixedMapping> {
        match self {
            Encoder::Fixed(mapping) => Ok(mapping),
            Encoder::Label(_) => Err(PredictionError::validation(format!(
                "encoder for {field} must be a fixed mapping"
            ))),
        }
    }
}

/// Categorical encoders loaded with the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSet {
    pub product_id: Encoder,
    pub location: Encoder,
    pub weekday: Encoder,
}

impl EncoderSet {
    pub fn new(products: Vec<String>, locations: Vec<String>) -> Self {
        Self {
            product_id: Encoder::Label(LabelEncoder::new(products)),
            location: Encoder::Label(LabelEncoder::new(locations)),
            weekday: Encoder::Fixed(FixedMapping::weekdays()),
        }
    }

    /// Checks each field carries its expected variant; called once when
    /// the artifact is loaded so prediction-time accessors cannot mismatch.
    pub fn check_shapes(&self) -> Result<()> {
        self.product_id.as_label("product_id")?;
        self.location.as_label("location")?;
        self.weekday.as_fixed("weekday")?;
        Ok(())
    }

    pub fn encode_product(&self, value: &str) -> Result<f64> {
        self.product_id.as_label("product_id")?.encode("product_id", value)
    }

    pub fn encode_location(&self, value: &str) -> Result<f64> {
        self.location.as_label("location")?.encode("location", value)
    }

    pub fn encode_weekday(&self, value: &str) -> Result<f64> {
        Ok(self.weekday.as_fixed("weekday")?.encode_or_default(value))
    }

    /// Every location in the trained vocabulary, in code order. Drives the
    /// "All" fan-out.
    pub fn known_locations(&self) -> Result<&[String]> {
        Ok(self.location.as_label("location")?.classes())
    }

    pub fn known_products(&self) -> Result<&[String]> {
        Ok(self.product_id.as_label("product_id")?.classes())
    }
}
