//! clients/cli/src/render.rs
//!
//! Plain-text rendering of analysis results and history entries.

use chrono::{Local, TimeZone};
use healthlens_core::domain::{AnalysisData, AnalysisResult, HealthScore, HistoryItem, Severity};
use std::fmt::Write as _;

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "[CRITICAL]",
        Severity::Moderate => "[MODERATE]",
        Severity::Info => "[INFO]",
    }
}

fn score_line(out: &mut String, label: &str, value: Option<u8>) {
    if let Some(v) = value {
        let _ = writeln!(out, "  {:<20} {:>2}/10", label, v);
    }
}

fn render_score(out: &mut String, score: &HealthScore) {
    out.push_str("\nHealth score:\n");
    score_line(out, "Overall", score.overall);
    score_line(out, "Nutritional value", score.nutritional_value);
    score_line(out, "Ingredient quality", score.ingredient_quality);
    score_line(out, "Processing level", score.processing_level);
}

pub fn render_data(data: &AnalysisData) -> String {
    let mut out = String::new();
    if let Some(name) = data.product_name() {
        let _ = writeln!(out, "Product: {}", name);
    }
    let _ = writeln!(out, "{}", data.quick_summary);

    // Critical first, then moderate, then info; model order is kept within a level.
    if !data.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for level in [Severity::Critical, Severity::Moderate, Severity::Info] {
            for w in data.warnings.iter().filter(|w| w.severity == level) {
                let _ = writeln!(out, "  {} {}: {}", severity_label(level), w.category, w.message);
            }
        }
    }

    if let Some(score) = &data.health_score {
        render_score(&mut out, score);
    }

    if !data.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for r in &data.recommendations {
            let _ = writeln!(out, "  - {}", r);
        }
    }
    out
}

pub fn render_result(result: &AnalysisResult) -> String {
    match (&result.data, &result.error) {
        (Some(data), _) if result.success => render_data(data),
        (_, Some(error)) => format!("Analysis failed: {}\n", error),
        _ => "Analysis failed\n".to_string(),
    }
}

fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// One line per entry: id, time, type and product.
pub fn render_history_list(items: &[HistoryItem]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(
            out,
            "{:<15} {}  {:<11} {}",
            item.id,
            format_timestamp(item.timestamp),
            item.analysis_type,
            item.product_name
        );
    }
    out
}

pub fn render_history_item(item: &HistoryItem) -> String {
    let mut out = format!(
        "{} | {} | {}\n\n",
        item.product_name,
        item.analysis_type,
        format_timestamp(item.timestamp)
    );
    out.push_str(&render_result(&item.result));
    out
}
