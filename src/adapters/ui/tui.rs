//! Implements InputPort. Inquire-based interactive menu.
//!
//! Import scrape data, pick a product, run review analysis, contradiction detection or
//! a full evaluation with report.

use crate::domain::{
    ContradictionReport, DomainError, Product, ProductAnalysis, SentimentGroup,
};
use crate::ports::{AnalysisPort, InputPort, ReviewSource};
use crate::usecases::{AnalysisService, ImportService};
use async_trait::async_trait;
use inquire::error::InquireError;
use inquire::ui::{Color, RenderConfig, StyleSheet, Styled};
use inquire::{CustomType, Select, Text};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Applies the prompt theme for all subsequent inquire prompts.
pub fn apply_theme() {
    let config = RenderConfig::default()
        .with_prompt_prefix(Styled::new("?").with_fg(Color::LightCyan))
        .with_highlighted_option_prefix(Styled::new("➤").with_fg(Color::LightMagenta))
        .with_answer(StyleSheet::new().with_fg(Color::LightGreen))
        .with_help_message(StyleSheet::new().with_fg(Color::DarkGrey));
    inquire::set_global_render_config(config);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    ImportReviews,
    ImportDetail,
    AnalyzeReviews,
    DetectContradictions,
    FullEvaluation,
    ExportReport,
    Quit,
}

impl MenuAction {
    const ALL: [MenuAction; 7] = [
        Self::ImportReviews,
        Self::ImportDetail,
        Self::AnalyzeReviews,
        Self::DetectContradictions,
        Self::FullEvaluation,
        Self::ExportReport,
        Self::Quit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ImportReviews => "📥 Import reviews (CSV)",
            Self::ImportDetail => "📄 Import product detail (JSON)",
            Self::AnalyzeReviews => "📊 Analyze reviews",
            Self::DetectContradictions => "⚖️  Detect contradictions",
            Self::FullEvaluation => "📝 Full evaluation + report",
            Self::ExportReport => "💾 Export latest report",
            Self::Quit => "🚪 Quit",
        })
    }
}

/// Prompt failures: Esc / Ctrl+C end the session, anything else is an input error.
fn prompt_err(e: InquireError) -> DomainError {
    match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            DomainError::Cancelled
        }
        other => DomainError::InvalidInput(other.to_string()),
    }
}

fn print_analysis(analysis: &ProductAnalysis) {
    println!();
    println!(
        "Product {}: score {:.1} ({}), trust {}",
        analysis.product_id, analysis.weighted_score, analysis.grade, analysis.trust_level
    );
    for group in SentimentGroup::ALL {
        if let Some(g) = analysis.group(group) {
            println!(
                "  {:<30} {:>4} reviews  +{} / -{}",
                group.label(),
                g.review_count,
                g.advantages.len(),
                g.disadvantages.len()
            );
        }
    }
    if analysis.chunks_failed() > 0 {
        println!(
            "  ⚠️  {} of {} chunk(s) failed",
            analysis.chunks_failed(),
            analysis.chunks_total()
        );
    }
    println!();
}

fn print_contradictions(report: &ContradictionReport) {
    println!();
    println!("{}", report.overall_assessment);
    for c in &report.contradictions {
        println!(
            "  [{}] {} <-> {} ({:.0}% of {})",
            c.severity,
            c.claim.text,
            c.conflicting_evidence,
            c.opposing_share * 100.0,
            c.group
        );
    }
    println!();
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    products: Arc<dyn ReviewSource>,
    analysis: Arc<AnalysisService>,
    import: Arc<ImportService>,
    shutdown: CancellationToken,
}

impl TuiInputPort {
    pub fn new(
        products: Arc<dyn ReviewSource>,
        analysis: Arc<AnalysisService>,
        import: Arc<ImportService>,
    ) -> Self {
        let shutdown = analysis.shutdown_token();
        Self {
            products,
            analysis,
            import,
            shutdown,
        }
    }

    async fn select_product(&self) -> Result<Option<Product>, DomainError> {
        let products = self.products.list_products().await?;
        if products.is_empty() {
            println!("No products yet. Import a review CSV first.");
            return Ok(None);
        }
        let product = Select::new("Select product", products)
            .with_page_size(15)
            .prompt()
            .map_err(prompt_err)?;
        Ok(Some(product))
    }

    async fn dispatch(&self, action: MenuAction) -> Result<(), DomainError> {
        match action {
            MenuAction::ImportReviews => {
                let path = Text::new("Review CSV path:").prompt().map_err(prompt_err)?;
                let stats = self.import.import_reviews(&PathBuf::from(path.trim())).await?;
                println!(
                    "Imported {} review(s) for {} product(s), {} new, {} row(s) skipped.",
                    stats.reviews_read, stats.products, stats.reviews_inserted, stats.rows_skipped
                );
            }
            MenuAction::ImportDetail => {
                let product_id = CustomType::<i64>::new("Product id:")
                    .prompt()
                    .map_err(prompt_err)?;
                let name = Text::new("Product name (empty keeps current):")
                    .prompt()
                    .map_err(prompt_err)?;
                let path = Text::new("Product detail JSON path:")
                    .prompt()
                    .map_err(prompt_err)?;
                let claims = self
                    .import
                    .import_product_detail(product_id, name.trim(), &PathBuf::from(path.trim()))
                    .await?;
                println!("Stored product detail with {} marketing claim(s).", claims);
            }
            MenuAction::AnalyzeReviews => {
                if let Some(product) = self.select_product().await? {
                    let analysis = self.analysis.analyze_reviews(product.id).await?;
                    print_analysis(&analysis);
                }
            }
            MenuAction::DetectContradictions => {
                if let Some(product) = self.select_product().await? {
                    let report = self.analysis.analyze_contradictions(product.id).await?;
                    print_contradictions(&report);
                }
            }
            MenuAction::FullEvaluation => {
                if let Some(product) = self.select_product().await? {
                    let evaluation = self.analysis.evaluate(product.id).await?;
                    print_analysis(&evaluation.analysis);
                    print_contradictions(&evaluation.report);
                    println!("Report saved to {}", evaluation.report_path.display());
                }
            }
            MenuAction::ExportReport => {
                if let Some(product) = self.select_product().await? {
                    let path = self.analysis.export_latest_report(product.id).await?;
                    println!("Report saved to {}", path.display());
                }
            }
            MenuAction::Quit => {}
        }
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }
            let action = match Select::new("Main menu", MenuAction::ALL.to_vec()).prompt() {
                Ok(action) => action,
                Err(e) => match prompt_err(e) {
                    DomainError::Cancelled => return Ok(()),
                    other => return Err(other),
                },
            };
            if action == MenuAction::Quit {
                return Ok(());
            }

            match self.dispatch(action).await {
                Ok(()) => {}
                Err(DomainError::Cancelled) if self.shutdown.is_cancelled() => return Ok(()),
                Err(DomainError::Cancelled) => println!("Cancelled."),
                Err(e) => {
                    warn!(error = %e, "action failed");
                    println!("❌ {}", e);
                }
            }
        }
    }
}
