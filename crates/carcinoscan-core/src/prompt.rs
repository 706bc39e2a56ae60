//! Prompt construction for the reasoning service.
//!
//! Two requests are built per ingredient: a component breakdown request and
//! the final assessment request. Both ask for a single JSON object and
//! nothing else, because the response parser only recovers JSON objects.

use crate::evidence::{EvidenceBundle, EvidenceSource};

/// System prompt for the assessment request.
pub const ASSESSMENT_SYSTEM_PROMPT: &str = "You are an expert in food safety and carcinogen \
risk assessment. Always output only valid JSON with the required keys.";

/// System prompt for the component breakdown request.
pub const BREAKDOWN_SYSTEM_PROMPT: &str =
    "You are a food science expert specializing in ingredient analysis.";

/// Text used in place of research when no evidence was gathered.
pub const NO_EVIDENCE_NOTICE: &str =
    "No detailed research available - using static knowledge base only";

/// Output contract embedded in every assessment prompt.
const OUTPUT_CONTRACT: &str = r#"
## Output Format
Respond with ONLY a valid JSON object in exactly this shape, no other text:
{
  "name": "<the ingredient name>",
  "risk_level": "Low" | "Medium" | "High" | "Unknown",
  "score": <integer 0-100>,
  "source": "primary sources cited, or 'Multiple sources'",
  "explanation": "assessment covering the ingredient and its components, highlighting the main risk factors",
  "processing_class": "1" | "2" | "3" | "4" | null
}

## Scoring Bands
- 0-30: Low risk (minimal or no carcinogenic evidence)
- 31-60: Medium risk (some concerning evidence or components)
- 61-100: High risk (strong evidence or multiple concerning components)

## Processing Class Extraction (look for this exact pattern)
- Search the evidence for text like "Category: 1", "Category: 2", "Category: 3" or "Category: 4"
- Copy the number after "Category:" into processing_class
- "Category: 4" means processing_class "4"
- "Category: 1" means processing_class "1"
- "Category: Unknown", or no category in the evidence, means processing_class null
- Always include the processing_class key, even when it is null

Respond ONLY with the JSON object. No prose before or after it.
"#;

/// Builds reasoning-service instructions from gathered evidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the assessment instruction for one ingredient.
    ///
    /// Evidence is inlined grouped by provenance, in presentation order.
    pub fn assessment(&self, ingredient: &str, evidence: &EvidenceBundle) -> String {
        let mut prompt = String::new();
        prompt.push_str("INGREDIENT TO ANALYZE: ");
        prompt.push_str(ingredient);
        prompt.push_str("\n\n");

        if evidence.is_empty() {
            prompt.push_str("## Evidence\n");
            prompt.push_str(NO_EVIDENCE_NOTICE);
            prompt.push_str("\n\n");
        } else {
            for (source, blocks) in evidence.grouped() {
                prompt.push_str(&format!("## {}\n", source.heading()));
                for block in blocks {
                    if source == EvidenceSource::WebSearch {
                        prompt.push_str(&format!(
                            "=== ANALYSIS: {} ===\n",
                            block.label.to_uppercase()
                        ));
                    } else if !block.label.is_empty() {
                        prompt.push_str(&format!("[{}]\n", block.label));
                    }
                    prompt.push_str(block.text.trim_end());
                    prompt.push_str("\n\n");
                }
            }
        }

        prompt.push_str(&format!(
            "Based on ALL of the above, assess the carcinogen risk of {}. Consider:\n\
             1. Direct risks from the main ingredient\n\
             2. Risks from chemical components, preservatives and additives\n\
             3. Processing-related risks\n\
             4. Cumulative risk from all components\n",
            json_string(ingredient)
        ));
        prompt.push_str(OUTPUT_CONTRACT);
        prompt.push_str(&format!(
            "The \"name\" field must be {}.\n",
            json_string(ingredient)
        ));
        prompt
    }

    /// Build the component breakdown instruction for one ingredient.
    pub fn breakdown(&self, ingredient: &str) -> String {
        let name = json_string(ingredient);
        format!(
            r#"Analyze the ingredient {name}.

Provide a breakdown including:
1. Primary chemical components and additives
2. Sub-ingredients if it is a processed food
3. Preservatives, colorings and other chemicals commonly found
4. Any known concerning compounds

Respond with ONLY a JSON object in this shape:
{{
  "ingredient": {name},
  "components": [
    {{"name": "component name", "type": "chemical | preservative | additive | sub-ingredient", "description": "brief description"}}
  ],
  "processing_chemicals": ["chemical"],
  "potential_concerns": ["concern"]
}}

Focus on components that might have health implications. Be thorough but factual."#
        )
    }
}

/// Quote a value as a JSON string so it cannot break the surrounding template.
fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
