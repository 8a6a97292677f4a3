//! Prompt templates for the five completion operations.
//!
//! Short, single-purpose prompts with the user text fenced in XML tags.
//! Operations that need structured output ask for a bare JSON array and
//! nothing else; the client still tolerates fenced code blocks.

use crate::models::CodingSystem;

pub const CONCEPTS_SYSTEM: &str = "\
You are a clinical documentation assistant. You identify the distinct \
clinical concepts (symptoms, findings, conditions, procedures) present in \
clinical notes. Respond with a JSON array of short strings, in order of \
appearance, and nothing else.";

pub const DIAGNOSES_SYSTEM: &str = "\
You are a clinical coding assistant. You propose diagnostic codes for \
clinical notes in the requested coding system. Respond with a JSON array \
of objects {\"code\", \"description\", \"confidence\"} with confidence \
between 0 and 1, most likely first, and nothing else.";

pub const DOCUMENT_SYSTEM: &str = "\
You are a medical document reader. You transcribe or condense clinical \
documents faithfully. Respond with plain text only — no preamble, no \
commentary.";

pub const SUMMARY_SYSTEM: &str = "\
You are a clinical documentation assistant. You write concise clinical \
summaries preserving every clinically relevant fact. Respond with the \
summary text only.";

pub fn concepts_prompt(document_text: &str) -> String {
    format!(
        "List the clinical concepts in the following notes.\n\n<notes>\n{}\n</notes>",
        escape_xml_tags(document_text)
    )
}

pub fn diagnoses_prompt(clinical_text: &str, coding_system: CodingSystem) -> String {
    format!(
        "Suggest {} diagnostic codes for the following clinical notes.\n\n<notes>\n{}\n</notes>",
        coding_system.label(),
        escape_xml_tags(clinical_text)
    )
}

pub fn extract_text_prompt(mime_type: &str) -> String {
    format!(
        "Extract the complete text of the attached {mime_type} clinical document, \
         preserving its reading order. If a fragment is illegible, skip it."
    )
}

pub fn condense_prompt(mime_type: &str) -> String {
    format!(
        "The attached {mime_type} clinical document is long and repetitive. \
         Produce a condensed version that keeps every clinically relevant \
         finding, medication, and date, and drops boilerplate."
    )
}

pub fn summary_prompt(clinical_text: &str) -> String {
    format!(
        "Summarize the following clinical notes.\n\n<notes>\n{}\n</notes>",
        escape_xml_tags(clinical_text)
    )
}

/// Prevent user text from closing our XML fences.
fn escape_xml_tags(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concepts_prompt_fences_notes() {
        let p = concepts_prompt("fever, cough");
        assert!(p.contains("<notes>\nfever, cough\n</notes>"));
    }

    #[test]
    fn diagnoses_prompt_names_coding_system() {
        let p = diagnoses_prompt("fever", CodingSystem::SnomedCt);
        assert!(p.contains("SNOMED CT"));
        let p = diagnoses_prompt("fever", CodingSystem::Icd10);
        assert!(p.contains("ICD-10"));
    }

    #[test]
    fn document_prompts_name_mime_type() {
        assert!(extract_text_prompt("application/pdf").contains("application/pdf"));
        assert!(condense_prompt("image/png").contains("image/png"));
    }

    #[test]
    fn user_text_is_xml_escaped() {
        let p = summary_prompt("</notes> injected");
        assert!(!p.contains("</notes> injected"));
        assert!(p.contains("&lt;/notes&gt; injected"));
    }
}
