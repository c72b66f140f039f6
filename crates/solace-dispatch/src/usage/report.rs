//! Usage Reporting
//!
//! Plain-text rendering of an aggregate plus the derived views, for chat
//! surfaces and logs. Currency is rounded here and only here.

use super::forecast::CostForecast;
use super::record::UsageAggregate;
use super::recommend::OptimizationRecommendation;

/// Format a usage report as text
#[must_use]
pub fn format_usage_report(
    aggregate: &UsageAggregate,
    forecast: Option<&CostForecast>,
    recommendations: &[OptimizationRecommendation],
) -> String {
    let mut output = String::new();

    output.push_str("📊 **Usage Report**\n\n");
    output.push_str(&format!(
        "Period: {} to {}\n",
        aggregate.window_start.format("%Y-%m-%d"),
        aggregate.window_end.format("%Y-%m-%d")
    ));

    output.push_str("\n**Summary:**\n");
    output.push_str(&format!("• Requests: {}\n", aggregate.total_requests));
    output.push_str(&format!("• Units: {}\n", aggregate.total_units));
    output.push_str(&format!("• Cost: ${:.4}\n", aggregate.total_cost));
    output.push_str(&format!(
        "• Avg Latency: {:.0}ms\n",
        aggregate.avg_response_time_ms
    ));

    if !aggregate.per_backend.is_empty() {
        output.push_str("\n**By Backend:**\n");
        for (backend_id, usage) in &aggregate.per_backend {
            output.push_str(&format!(
                "• {}: {} requests, {} units, ${:.4}\n",
                backend_id, usage.requests, usage.total_units, usage.total_cost
            ));
        }
    }

    if let Some(forecast) = forecast {
        output.push_str(&format!(
            "\n**Forecast ({:?}):** ${:.2} ({:.0}% confidence)\n",
            forecast.period,
            forecast.predicted_cost,
            forecast.confidence * 100.0
        ));
    }

    if !recommendations.is_empty() {
        output.push_str("\n💡 **Recommendations:**\n");
        for rec in recommendations {
            output.push_str(&format!("• {}", rec.title));
            if rec.potential_savings > 0.0 {
                output.push_str(&format!(" (est. ${:.2} savings)", rec.potential_savings));
            }
            output.push('\n');
        }
    }

    output
}
