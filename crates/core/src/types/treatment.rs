//! Treatment advice attached to a diagnosis.

use serde::{Deserialize, Serialize};

/// Treatment options grouped by approach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    /// Cultural practices that stop the disease from taking hold.
    pub prevention: Vec<String>,
    /// Organic treatments.
    pub organic: Vec<String>,
    /// Chemical treatments.
    pub chemical: Vec<String>,
}

/// Description and treatment advice for one disease label.
///
/// The serialized shape (`description` + `treatment.{prevention,organic,chemical}`)
/// is what the ledger stores and what a remote treatment source must return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentInfo {
    pub description: String,
    pub treatment: TreatmentPlan,
}

impl TreatmentInfo {
    /// Build a record from string slices.
    #[must_use]
    pub fn new(description: &str, prevention: &[&str], organic: &[&str], chemical: &[&str]) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect();
        Self {
            description: description.to_owned(),
            treatment: TreatmentPlan {
                prevention: owned(prevention),
                organic: owned(organic),
                chemical: owned(chemical),
            },
        }
    }

    /// Generic record used when nothing is known about a label.
    ///
    /// Carries exactly one prevention tip pointing the grower to a human expert.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(
            "No information available for this disease",
            &["Consult local agricultural extension officer"],
            &[],
            &[],
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_shape() {
        let info = TreatmentInfo::fallback();
        assert_eq!(info.treatment.prevention.len(), 1);
        assert!(info.treatment.organic.is_empty());
        assert!(info.treatment.chemical.is_empty());
    }

    #[test]
    fn test_deserialize_rejects_missing_treatment() {
        let json = r#"{"description": "only a description"}"#;
        assert!(serde_json::from_str::<TreatmentInfo>(json).is_err());
    }

    #[test]
    fn test_deserialize_remote_shape() {
        let json = r#"{
            "description": "Fungal disease",
            "treatment": {"prevention": ["Rotate crops"], "organic": [], "chemical": ["Mancozeb"]}
        }"#;
        let info: TreatmentInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.treatment.chemical, vec!["Mancozeb".to_string()]);
    }
}
