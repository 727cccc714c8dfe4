//! crates/healthlens_core/src/prompt.rs
//!
//! Renders the instruction text sent to the vision model alongside the image.
//! The output is a pure function of its inputs so stubbed model calls stay
//! reproducible.

use crate::domain::{AnalysisType, HealthProfile};
use std::fmt::Write;

const SYSTEM_INSTRUCTIONS: &str = r#"# HealthLens AI - Medication and Nutrition Analysis Assistant

## Role
You are HealthLens AI. You analyze photos of medication labels, prescriptions,
food packaging, nutrition labels and restaurant menus, and you help the user make
informed health decisions. You are not a doctor and you never present your output
as a diagnosis.

## What to look for

### Medication
- Brand and generic names, active ingredients and their strengths
- Indications, usual dosing and storage requirements
- Common and serious side effects
- Warnings for pregnancy, breastfeeding, liver or kidney impairment
- Interactions with any current medications listed in the user's profile

### Food
- Nutrition facts per serving (calories, macronutrients, notable vitamins and minerals)
- Ingredients in listed order, additives, preservatives and colorings
- Common allergens (gluten, dairy, tree nuts, peanuts, soy, eggs, fish, shellfish, sesame)
- Daily-value context, e.g. "one serving covers 60% of daily sodium"
- Healthier alternatives when they are relevant

### Interaction
- Every interaction between the medications in the image and the user's current medications
- Severity (major, moderate, minor), mechanism and clinical significance
- Timing or management strategies, and combinations that need immediate medical attention

### Allergen
- Every ingredient matching the user's allergies, including hidden sources
  (for example casein in "non-dairy" creamers)
- "May contain" and shared-facility statements
- How serious the exposure could be for an allergic person

## Response format
Respond with a single JSON object and nothing else, using this structure:
{
  "quickSummary": "2-3 sentence overview",
  "detailedAnalysis": {
    "productInfo": {
      "name": "Product name",
      "manufacturer": "Manufacturer",
      "category": "medication|food|supplement",
      "primaryPurpose": "Main use or benefit"
    },
    "keyComponents": {
      "activeIngredients": ["..."],
      "quantities": ["..."],
      "allergens": ["..."],
      "additives": ["..."]
    },
    "healthConsiderations": {
      "benefits": ["..."],
      "risks": ["..."],
      "sideEffects": ["..."]
    }
  },
  "healthScore": {
    "nutritionalValue": 0,
    "ingredientQuality": 0,
    "processingLevel": 0,
    "overall": 0
  },
  "warnings": [
    {
      "severity": "critical|moderate|info",
      "category": "Category name",
      "message": "Detailed warning"
    }
  ],
  "recommendations": ["..."],
  "disclaimer": "Medical disclaimer appropriate to the analysis"
}
Scores are integers from 0 to 10. Omit "healthScore" when it does not apply.

## Safety rules
- Mark dangerous drug interactions and allergens the user reported as "critical".
- Mention contraindications for the user's conditions, pregnancy and breastfeeding.
- Say so when the image is unreadable or you are unsure; never guess dosages.
- Always recommend consulting a doctor or pharmacist before changing any medication.
- Use plain language and explain medical terms briefly in parentheses."#;

/// Builds the full prompt for one analysis.
///
/// Profile lines are emitted only for fields that carry a value, in a fixed
/// order, so identical inputs always render identical text.
pub fn build_analysis_prompt(
    analysis_type: AnalysisType,
    profile: Option<&HealthProfile>,
    additional_context: Option<&str>,
) -> String {
    let mut prompt = String::from(SYSTEM_INSTRUCTIONS);

    let _ = write!(
        prompt,
        "\n\n## Current Analysis Type: {}\n",
        analysis_type.as_str().to_uppercase()
    );

    let profile_lines = profile.map(profile_lines).unwrap_or_default();
    if !profile_lines.is_empty() {
        prompt.push_str("\n## User Health Profile:\n");
        for line in &profile_lines {
            let _ = writeln!(prompt, "- {line}");
        }
    }

    if let Some(context) = additional_context.map(str::trim).filter(|c| !c.is_empty()) {
        let _ = write!(prompt, "\n## Additional Context:\n{context}\n");
    }

    let _ = write!(
        prompt,
        "\n\nAnalyze the attached image and respond with the JSON object described above. \
         Focus on the {analysis_type} analysis and personalize it using the user's health \
         profile when one is provided."
    );

    prompt
}

fn profile_lines(profile: &HealthProfile) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(age) = profile.age.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(format!("Age: {}", age.trim()));
    }
    push_list(&mut lines, "Conditions", &profile.conditions);
    push_list(&mut lines, "Current Medications", &profile.current_medications);
    push_list(&mut lines, "Allergies", &profile.allergies);
    push_list(&mut lines, "Dietary Restrictions", &profile.dietary_restrictions);
    if profile.is_pregnant {
        lines.push("Pregnancy: Yes".to_string());
    }
    if profile.is_breastfeeding {
        lines.push("Breastfeeding: Yes".to_string());
    }
    if let Some(notes) = profile
        .additional_notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
    {
        lines.push(format!("Additional Notes: {}", notes.trim()));
    }

    lines
}

fn push_list(lines: &mut Vec<String>, label: &str, items: &[String]) {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !items.is_empty() {
        lines.push(format!("{label}: {}", items.join(", ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_profile() -> HealthProfile {
        HealthProfile {
            age: Some("34".into()),
            conditions: vec!["asthma".into()],
            current_medications: vec!["warfarin".into(), "metformin".into()],
            allergies: vec!["peanut".into()],
            dietary_restrictions: vec!["vegetarian".into()],
            is_pregnant: true,
            is_breastfeeding: true,
            additional_notes: Some("sensitive stomach".into()),
        }
    }

    #[test]
    fn contains_uppercase_analysis_type() {
        for analysis_type in AnalysisType::ALL {
            let prompt = build_analysis_prompt(analysis_type, None, None);
            let expected = format!(
                "## Current Analysis Type: {}",
                analysis_type.as_str().to_uppercase()
            );
            assert!(prompt.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn profile_lines_follow_fixed_order() {
        let prompt = build_analysis_prompt(AnalysisType::Medication, Some(&full_profile()), None);
        let labels = [
            "- Age: 34",
            "- Conditions: asthma",
            "- Current Medications: warfarin, metformin",
            "- Allergies: peanut",
            "- Dietary Restrictions: vegetarian",
            "- Pregnancy: Yes",
            "- Breastfeeding: Yes",
            "- Additional Notes: sensitive stomach",
        ];
        let positions: Vec<usize> = labels
            .iter()
            .map(|l| prompt.find(l).unwrap_or_else(|| panic!("missing {l}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn absent_fields_are_omitted() {
        let profile = HealthProfile {
            conditions: vec!["diabetes".into()],
            allergies: vec![],
            is_pregnant: false,
            ..Default::default()
        };
        let prompt = build_analysis_prompt(AnalysisType::Food, Some(&profile), None);
        assert!(prompt.contains("- Conditions: diabetes"));
        assert!(!prompt.contains("Allergies:"));
        assert!(!prompt.contains("Pregnancy:"));
        assert!(!prompt.contains("Age:"));
    }

    #[test]
    fn empty_profile_emits_no_profile_section() {
        let prompt = build_analysis_prompt(AnalysisType::Food, Some(&HealthProfile::default()), None);
        assert!(!prompt.contains("## User Health Profile:"));
    }

    #[test]
    fn additional_context_is_appended_before_closing() {
        let prompt =
            build_analysis_prompt(AnalysisType::Interaction, None, Some("Taken with grapefruit"));
        let context = prompt.find("## Additional Context:\nTaken with grapefruit").unwrap();
        let closing = prompt.find("Analyze the attached image").unwrap();
        assert!(context < closing);
        assert!(prompt.ends_with("profile when one is provided."));

        let blank = build_analysis_prompt(AnalysisType::Interaction, None, Some("   "));
        assert!(!blank.contains("## Additional Context:"));
    }

    #[test]
    fn output_is_stable() {
        let profile = full_profile();
        let a = build_analysis_prompt(AnalysisType::Allergen, Some(&profile), Some("x"));
        let b = build_analysis_prompt(AnalysisType::Allergen, Some(&profile), Some("x"));
        assert_eq!(a, b);
    }
}
