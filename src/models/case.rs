use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::CodingSystem;

/// The active form-scoped case. Replaced wholesale on file upload or
/// history reload; never persisted directly.
#[derive(Debug, Clone)]
pub struct ClinicalCase {
    pub clinical_text: String,
    pub coding_system: CodingSystem,
    pub source_file_name: Option<String>,
}

impl ClinicalCase {
    pub fn empty(coding_system: CodingSystem) -> Self {
        Self {
            clinical_text: String::new(),
            coding_system,
            source_file_name: None,
        }
    }
}

impl Default for ClinicalCase {
    fn default() -> Self {
        Self::empty(CodingSystem::Icd10)
    }
}

/// One suggested diagnostic code.
///
/// `id` is a surrogate key minted when the suggestion arrives from the
/// AI service — duplicate codes in a single response never collide.
/// Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisSuggestion {
    pub id: String,
    pub code: String,
    pub description: String,
    pub confidence: f64,
    pub is_principal: bool,
    pub is_selected: bool,
}

impl DiagnosisSuggestion {
    /// Mint a suggestion as it arrives from the AI service.
    ///
    /// Confidence is clamped to [0, 1]; flags start cleared.
    pub fn arriving(code: &str, description: &str, confidence: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            description: description.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            is_principal: false,
            is_selected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_case_has_no_text() {
        let case = ClinicalCase::empty(CodingSystem::SnomedCt);
        assert!(case.clinical_text.is_empty());
        assert_eq!(case.coding_system, CodingSystem::SnomedCt);
        assert!(case.source_file_name.is_none());
    }

    #[test]
    fn arriving_suggestion_mints_unique_ids() {
        let a = DiagnosisSuggestion::arriving("J18.9", "Pneumonia, unspecified", 0.82);
        let b = DiagnosisSuggestion::arriving("J18.9", "Pneumonia, unspecified", 0.82);
        assert_ne!(a.id, b.id);
        assert!(!a.is_principal);
        assert!(!a.is_selected);
    }

    #[test]
    fn arriving_suggestion_clamps_confidence() {
        assert_eq!(DiagnosisSuggestion::arriving("A00", "Cholera", 1.7).confidence, 1.0);
        assert_eq!(DiagnosisSuggestion::arriving("A00", "Cholera", -0.2).confidence, 0.0);
    }

    #[test]
    fn suggestion_serializes_camel_case() {
        let s = DiagnosisSuggestion::arriving("E11.9", "Type 2 diabetes mellitus", 0.9);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"isPrincipal\":false"));
        assert!(json.contains("\"isSelected\":false"));
        assert!(json.contains("\"code\":\"E11.9\""));
    }
}
