//! Markdown audit reports for a product's review analysis and claim verdicts.

use crate::domain::{
    AnalysisWarning, ContradictionReport, DomainError, GroupSummary, Insight, ProductAnalysis,
    WarningScope,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Insights listed per side and group.
const REPORT_POINTS_PER_SIDE: usize = 10;

fn push_insights(md: &mut String, title: &str, items: &[Insight]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(md, "**{}**\n", title);
    for insight in items.iter().take(REPORT_POINTS_PER_SIDE) {
        let _ = write!(md, "- {} ({} review(s))", insight.point, insight.evidence.len());
        if !insight.details.is_empty() {
            let _ = write!(md, ": {}", insight.details);
        }
        md.push('\n');
    }
    if items.len() > REPORT_POINTS_PER_SIDE {
        let _ = writeln!(md, "- *...and {} more*", items.len() - REPORT_POINTS_PER_SIDE);
    }
    md.push('\n');
}

fn push_group(md: &mut String, group: &GroupSummary) {
    let _ = writeln!(md, "### {}\n", group.group.label());
    let _ = writeln!(
        md,
        "{} review(s), {} classified, {}/{} chunk(s) failed\n",
        group.review_count, group.contributing_reviews, group.chunks_failed, group.chunks_total
    );
    push_insights(md, "Advantages", &group.advantages);
    push_insights(md, "Disadvantages", &group.disadvantages);
    if !group.summary.is_empty() {
        let _ = writeln!(md, "> {}\n", group.summary);
    }
}

fn push_warnings(md: &mut String, warnings: &[AnalysisWarning]) {
    for warning in warnings {
        match warning {
            AnalysisWarning::PartialAnalysis {
                scope,
                failed,
                total,
            } => {
                let unit = match scope {
                    WarningScope::Chunks => "chunks",
                    WarningScope::Claims => "claims",
                };
                let _ = writeln!(
                    md,
                    "> ⚠️ Partial analysis: {} of {} {} failed.",
                    failed, total, unit
                );
            }
            AnalysisWarning::Cancelled { unfinished } => {
                let _ = writeln!(md, "> ⚠️ Cancelled: {} unit(s) unfinished.", unfinished);
            }
        }
    }
    if !warnings.is_empty() {
        md.push('\n');
    }
}

/// Render the report body.
pub fn render_report(analysis: &ProductAnalysis, verdicts: Option<&ContradictionReport>) -> String {
    let mut md = String::new();
    let timestamp = analysis.analyzed_at.format("%Y-%m-%d %H:%M UTC");

    // Header
    let _ = writeln!(md, "# Claim Audit: Product {}\n", analysis.product_id);
    let _ = writeln!(
        md,
        "**Run:** {} | **Analyzed:** {} | **Reviews:** {}\n",
        analysis.run_id,
        timestamp,
        analysis.total_reviews()
    );
    md.push_str("---\n\n");

    // Score
    md.push_str("## 📊 Review Score\n\n");
    let _ = writeln!(
        md,
        "Weighted score **{:.1}** (grade **{}**), trust level **{}**.\n",
        analysis.weighted_score, analysis.grade, analysis.trust_level
    );
    push_warnings(&mut md, &analysis.warnings);

    // Groups
    md.push_str("## 🗂 Review Groups\n\n");
    for group in &analysis.groups {
        push_group(&mut md, group);
    }

    if let Some(report) = verdicts {
        md.push_str("## ⚖️ Marketing Claims\n\n");
        let _ = writeln!(md, "{}\n", report.overall_assessment);
        let _ = writeln!(
            md,
            "Final score **{:.1}** (grade **{}**, penalty {:.1}), trust level **{}**.\n",
            report.final_score, report.final_grade, report.penalty, report.trust_level
        );
        push_warnings(&mut md, &report.warnings);

        if !report.contradictions.is_empty() {
            md.push_str("### Contradictions\n\n");
            md.push_str("| Severity | Category | Claim | Opposing evidence | Share |\n");
            md.push_str("|---|---|---|---|---|\n");
            for c in &report.contradictions {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} | {:.0}% of {} |",
                    c.severity,
                    c.category,
                    c.claim.text.replace('|', "/"),
                    c.conflicting_evidence.replace('|', "/"),
                    c.opposing_share * 100.0,
                    c.group
                );
            }
            md.push('\n');
        }

        if !report.consistency_points.is_empty() {
            md.push_str("### Supported Claims\n\n");
            for point in &report.consistency_points {
                let _ = writeln!(md, "- {}", point);
            }
            md.push('\n');
        }

        if !report.failures.is_empty() {
            md.push_str("### Unverified Claims\n\n");
            for failure in &report.failures {
                let _ = writeln!(md, "- `{}`: {}", failure.unit, failure.message);
            }
            md.push('\n');
        }
    }

    // Footer
    md.push_str("---\n");
    md.push_str("*Generated by claim-audit*\n");
    md
}

/// Write the report to `reports_dir`. Returns the file path.
pub async fn write_report(
    reports_dir: &Path,
    analysis: &ProductAnalysis,
    verdicts: Option<&ContradictionReport>,
) -> Result<PathBuf, DomainError> {
    fs::create_dir_all(reports_dir)
        .await
        .map_err(|e| DomainError::Repo(format!("Failed to create reports dir: {}", e)))?;

    let filename = format!(
        "audit_{}_{}.md",
        analysis.product_id,
        analysis.analyzed_at.format("%Y%m%d_%H%M%S")
    );
    let path = reports_dir.join(filename);

    fs::write(&path, render_report(analysis, verdicts))
        .await
        .map_err(|e| DomainError::Repo(format!("Failed to write report: {}", e)))?;

    info!(path = %path.display(), "report generated");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Grade, SentimentGroup, TrustLevel};
    use chrono::Utc;
    use uuid::Uuid;

    fn analysis() -> ProductAnalysis {
        ProductAnalysis {
            run_id: Uuid::new_v4(),
            product_id: 42,
            analyzed_at: Utc::now(),
            groups: vec![GroupSummary {
                group: SentimentGroup::Negative21,
                review_count: 2,
                contributing_reviews: 2,
                chunks_total: 1,
                chunks_failed: 0,
                advantages: Vec::new(),
                disadvantages: vec![Insight::new("irritated my skin").with_evidence([1, 2])],
                summary: "Mostly irritation.".into(),
                rating_counts: [2, 0, 0, 0, 0],
            }],
            weighted_score: 20.0,
            grade: Grade::D,
            trust_level: TrustLevel::Low,
            failures: Vec::new(),
            warnings: vec![AnalysisWarning::PartialAnalysis {
                scope: WarningScope::Chunks,
                failed: 1,
                total: 2,
            }],
        }
    }

    #[test]
    fn test_render_contains_sections() {
        let md = render_report(&analysis(), None);
        assert!(md.starts_with("# Claim Audit: Product 42"));
        assert!(md.contains("Weighted score **20.0** (grade **D**), trust level **low**"));
        assert!(md.contains("- irritated my skin (2 review(s))"));
        assert!(md.contains("Partial analysis: 1 of 2 chunks failed"));
        assert!(!md.contains("Marketing Claims"));
    }

    #[tokio::test]
    async fn test_write_report_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let path = write_report(&reports, &analysis(), None).await.unwrap();
        assert!(path.starts_with(&reports));
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("Negative reviews (2-1 stars)"));
    }
}
