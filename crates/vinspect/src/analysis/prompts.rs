//! Prompt builders and per-stage response schemas.
//!
//! Everything here is data passed through to the capability: the text
//! steers the model, the schemas gate what comes back.

use serde_json::{json, Value};

use crate::db::job_repo::JobKind;
use crate::evidence::EvidenceItem;

/// Vehicle-level context attached to the first chunk job's prompt.
#[derive(Debug, Clone, Default)]
pub struct VehicleContext {
    pub vin: String,
    pub mileage: i64,
    pub zip: String,
    /// `(code, description)` pairs from the OBD2 evidence items.
    pub obd_codes: Vec<(String, String)>,
}

impl VehicleContext {
    fn as_block(&self) -> String {
        let mut block = format!(
            "VEHICLE:\nVIN: {}\nMileage: {} miles\nLocation ZIP: {}\n",
            self.vin, self.mileage, self.zip
        );
        if !self.obd_codes.is_empty() {
            block.push_str("OBD2 trouble codes:\n");
            for (code, description) in &self.obd_codes {
                block.push_str(&format!("- {}: {}\n", code, description));
            }
        }
        block
    }
}

fn category_list(items: &[EvidenceItem]) -> String {
    items
        .iter()
        .map(|i| i.category.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt for one chunk-analysis job.
///
/// The first chunk gets the vehicle context; later chunks instead get the
/// previous chunk's findings so the model reconciles new evidence with
/// what it already reported.
pub fn chunk_analysis_prompt(
    context: Option<&VehicleContext>,
    prior_result: Option<&Value>,
    chunk_index: i64,
    chunk_total: i64,
    items: &[EvidenceItem],
) -> String {
    let mut prompt = format!(
        "You are a professional used-vehicle inspector. Analyze the attached photos \
         (batch {} of {}; categories: {}) and report condition findings.\n\n",
        chunk_index,
        chunk_total,
        category_list(items)
    );

    if let Some(ctx) = context {
        prompt.push_str(&ctx.as_block());
        prompt.push('\n');
    }

    if let Some(prior) = prior_result {
        prompt.push_str(
            "PRIOR FINDINGS from earlier photo batches (merge with what you see now; \
             keep scores consistent, update them only if the new photos justify it):\n",
        );
        prompt.push_str(&prior.to_string());
        prompt.push_str("\n\n");
    }

    prompt.push_str(
        "Score each visible area 0-10 (10 = excellent), list every defect you can see \
         with a severity and a rough US repair cost, and summarize the overall condition. \
         Respond ONLY with valid JSON matching the agreed shape. Do not include any other text.",
    );
    prompt
}

/// Prompt for a downstream research stage, fed the merged image analysis.
pub fn stage_prompt(kind: JobKind, context: &VehicleContext, analysis: &Value) -> String {
    let task = match kind {
        JobKind::OwnershipCostForecast => {
            "Forecast the yearly and five-year ownership cost (maintenance, repairs, \
             insurance, fuel) for this vehicle given its condition findings."
        }
        JobKind::FairMarketValue => {
            "Research a fair private-party market value range for this vehicle in its \
             current condition near the given ZIP code."
        }
        JobKind::ExpertAdvice => {
            "Act as an independent buying advisor: give a verdict, the main concerns, \
             and concrete negotiation points based on the condition findings."
        }
        JobKind::ChunkAnalysis => unreachable!("chunk analysis has its own prompt"),
    };

    format!(
        "{task}\n\n{vehicle}\nCONDITION FINDINGS:\n{analysis}\n\n\
         Respond ONLY with valid JSON matching the agreed shape. Do not include any other text.",
        task = task,
        vehicle = context.as_block(),
        analysis = analysis
    )
}

/// Output shape for chunk-analysis jobs.
pub fn chunk_analysis_schema() -> Value {
    json!({
        "type": "object",
        "required": ["condition_scores", "findings", "summary"],
        "properties": {
            "condition_scores": {
                "type": "object",
                "additionalProperties": {"type": "number", "minimum": 0, "maximum": 10}
            },
            "findings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["area", "severity", "description"],
                    "properties": {
                        "area": {"type": "string"},
                        "severity": {"type": "string", "enum": ["minor", "moderate", "severe"]},
                        "description": {"type": "string"},
                        "estimated_repair_cost_usd": {"type": "number", "minimum": 0}
                    }
                }
            },
            "summary": {"type": "string"}
        }
    })
}

/// Output shape for a downstream stage.
pub fn stage_schema(kind: JobKind) -> Value {
    match kind {
        JobKind::OwnershipCostForecast => json!({
            "type": "object",
            "required": ["annual_cost_usd", "five_year_total_usd", "breakdown"],
            "properties": {
                "annual_cost_usd": {"type": "number", "minimum": 0},
                "five_year_total_usd": {"type": "number", "minimum": 0},
                "breakdown": {
                    "type": "object",
                    "additionalProperties": {"type": "number", "minimum": 0}
                },
                "notes": {"type": "string"}
            }
        }),
        JobKind::FairMarketValue => json!({
            "type": "object",
            "required": ["low_usd", "high_usd", "typical_usd"],
            "properties": {
                "low_usd": {"type": "number", "minimum": 0},
                "high_usd": {"type": "number", "minimum": 0},
                "typical_usd": {"type": "number", "minimum": 0},
                "notes": {"type": "string"}
            }
        }),
        JobKind::ExpertAdvice => json!({
            "type": "object",
            "required": ["verdict", "concerns", "negotiation_points"],
            "properties": {
                "verdict": {"type": "string", "enum": ["buy", "buy_with_caution", "avoid"]},
                "concerns": {"type": "array", "items": {"type": "string"}},
                "negotiation_points": {"type": "array", "items": {"type": "string"}}
            }
        }),
        JobKind::ChunkAnalysis => chunk_analysis_schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::ItemCategory;

    fn context() -> VehicleContext {
        VehicleContext {
            vin: "WVWZZZ3CZWE689725".to_string(),
            mileage: 87000,
            zip: "60601".to_string(),
            obd_codes: vec![("P0301".to_string(), "Cylinder 1 misfire".to_string())],
        }
    }

    #[test]
    fn test_first_chunk_prompt_carries_vehicle_context() {
        let items = vec![EvidenceItem::new(ItemCategory::Exterior, 10, "file:///a.jpg")];
        let prompt = chunk_analysis_prompt(Some(&context()), None, 1, 3, &items);
        assert!(prompt.contains("WVWZZZ3CZWE689725"));
        assert!(prompt.contains("P0301"));
        assert!(prompt.contains("batch 1 of 3"));
        assert!(!prompt.contains("PRIOR FINDINGS"));
    }

    #[test]
    fn test_later_chunk_prompt_carries_prior_findings() {
        let items = vec![EvidenceItem::new(ItemCategory::Engine, 10, "file:///e.jpg")];
        let prior = json!({"summary": "clean exterior"});
        let prompt = chunk_analysis_prompt(None, Some(&prior), 2, 3, &items);
        assert!(prompt.contains("PRIOR FINDINGS"));
        assert!(prompt.contains("clean exterior"));
    }

    #[test]
    fn test_stage_prompt_embeds_analysis() {
        let analysis = json!({"summary": "rust on sills"});
        let prompt = stage_prompt(JobKind::FairMarketValue, &context(), &analysis);
        assert!(prompt.contains("rust on sills"));
        assert!(prompt.contains("60601"));
    }

    #[test]
    fn test_stage_schemas_compile() {
        for kind in [
            JobKind::ChunkAnalysis,
            JobKind::OwnershipCostForecast,
            JobKind::FairMarketValue,
            JobKind::ExpertAdvice,
        ] {
            let schema = stage_schema(kind);
            assert!(jsonschema::JSONSchema::compile(&schema).is_ok());
        }
    }
}
