//! AI-assisted report generation with a deterministic templated fallback.
//!
//! The model only narrates numbers computed by [`crate::services::analysis`];
//! it never sees raw records. Generation cannot fail: a missing client, a
//! failed call, or an unparseable reply all produce the fallback report.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::models::report::ReportFilters;
use crate::services::analysis::{AssemblyPerformance, FinancialHealth, PeriodSummary};
use crate::services::llm::LlmClient;
use crate::services::period;
use crate::services::report_cache::{self, ReportCache};

/// Assemblies listed individually in the prompt; the rest are summarised.
const PROMPT_ASSEMBLY_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Structured JSON reply.
    #[default]
    Analysis,
    /// Free prose reply.
    Narrative,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Narrative => "narrative",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    Ai,
    Cache,
    Fallback,
}

/// Everything the prompt and fallback templates draw from.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub filters: ReportFilters,
    pub summary: PeriodSummary,
    pub previous: Option<PeriodSummary>,
    pub assemblies: Vec<AssemblyPerformance>,
    pub health: FinancialHealth,
}

impl AnalysisContext {
    /// Human label such as "March 2026", "2026" or "all recorded periods".
    pub fn period_label(&self) -> String {
        let period = match (&self.filters.month, self.filters.year) {
            (Some(month), _) => period::display_month(month),
            (None, Some(year)) => year.to_string(),
            (None, None) => "all recorded periods".to_string(),
        };
        let mut label = period;
        if let Some(service) = self.filters.service_type {
            let _ = write!(label, " ({service})");
        }
        label
    }

    pub fn scope_label(&self) -> String {
        match &self.filters.assembly {
            Some(assembly) => assembly.clone(),
            None => "the district".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiAnalysis {
    pub executive_summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub attendance_insights: Option<String>,
    #[serde(default)]
    pub financial_outlook: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub kind: ReportKind,
    pub source: ReportSource,
    pub period: String,
    pub scope: String,
    pub health_score: u8,
    pub model: Option<String>,
    pub analysis: Option<AiAnalysis>,
    pub narrative: Option<String>,
    pub fallback_reason: Option<String>,
    pub generated_at: DateTime<Utc>,
}

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a financial analyst for a church district. \
You receive precomputed attendance and giving figures and explain them for district \
leadership. Use only the numbers provided; never invent figures. Respond with a single JSON \
object with the keys \"executive_summary\" (string), \"key_findings\" (array of strings), \
\"recommendations\" (array of strings), \"attendance_insights\" (string) and \
\"financial_outlook\" (string). Do not wrap the JSON in prose.";

const NARRATIVE_SYSTEM_PROMPT: &str = "You are a report writer for a church district. \
You receive precomputed attendance and giving figures and write a short, warm but factual \
narrative report of three to five paragraphs for the district pastor. Use only the numbers \
provided. Reply in plain text without markdown headings.";

pub fn create_enhanced_analysis_prompt(ctx: &AnalysisContext, kind: ReportKind) -> Prompt {
    let s = &ctx.summary;
    let mut user = String::new();

    let _ = writeln!(user, "Report scope: {}", ctx.scope_label());
    let _ = writeln!(user, "Period: {}", ctx.period_label());
    let _ = writeln!(user);
    let _ = writeln!(user, "## Summary");
    let _ = writeln!(user, "- Reports submitted: {}", s.report_count);
    let _ = writeln!(user, "- Services recorded: {}", s.service_count);
    let _ = writeln!(user, "- Total income: {}", format_amount(s.total_income));
    let _ = writeln!(
        user,
        "- Tithes: {} ({}% of income)",
        format_amount(s.total_tithes),
        s.tithe_percentage
    );
    let _ = writeln!(
        user,
        "- Offerings (all other categories): {}",
        format_amount(s.total_offerings)
    );
    let _ = writeln!(user, "- Total attendance: {}", s.total_attendance);
    let _ = writeln!(user, "- Average attendance per service: {}", s.average_attendance);

    if let Some(prev) = &ctx.previous {
        let _ = writeln!(user);
        let _ = writeln!(user, "## Previous period");
        let _ = writeln!(user, "- Total income: {}", format_amount(prev.total_income));
        let _ = writeln!(user, "- Total attendance: {}", prev.total_attendance);
    }

    let _ = writeln!(user);
    let _ = writeln!(user, "## Income by category");
    for (label, amount) in s.categories.labelled() {
        if amount > Decimal::ZERO {
            let _ = writeln!(user, "- {label}: {}", format_amount(amount));
        }
    }

    if !ctx.assemblies.is_empty() {
        let _ = writeln!(user);
        let _ = writeln!(user, "## Assemblies (ranked by income)");
        for a in ctx.assemblies.iter().take(PROMPT_ASSEMBLY_LIMIT) {
            let _ = writeln!(
                user,
                "{}. {}: income {}, tithes {}%, attendance {} over {} services \
                 (avg {}), {}% of income",
                a.rank,
                a.assembly,
                format_amount(a.total_income),
                a.tithe_percentage,
                a.total_attendance,
                a.service_count,
                a.average_attendance,
                a.share_of_income,
            );
        }
        if ctx.assemblies.len() > PROMPT_ASSEMBLY_LIMIT {
            let _ = writeln!(
                user,
                "... and {} more assemblies",
                ctx.assemblies.len() - PROMPT_ASSEMBLY_LIMIT
            );
        }
    }

    let h = &ctx.health;
    let _ = writeln!(user);
    let _ = writeln!(user, "## Financial health");
    let _ = writeln!(user, "- Score: {}/10 ({})", h.score, h.rating);
    if let Some(g) = h.metrics.income_growth {
        let _ = writeln!(user, "- Income growth: {g}%");
    }
    if let Some(g) = h.metrics.attendance_growth {
        let _ = writeln!(user, "- Attendance growth: {g}%");
    }
    for strength in &h.strengths {
        let _ = writeln!(user, "- Strength: {strength}");
    }
    for concern in &h.concerns {
        let _ = writeln!(user, "- Concern: {concern}");
    }

    let system = match kind {
        ReportKind::Analysis => ANALYSIS_SYSTEM_PROMPT,
        ReportKind::Narrative => NARRATIVE_SYSTEM_PROMPT,
    };

    Prompt {
        system: system.to_string(),
        user,
    }
}

/// Parse a JSON analysis reply, tolerating code fences and surrounding prose.
pub fn parse_analysis_response(text: &str) -> Result<AiAnalysis, String> {
    let trimmed = strip_code_fence(text.trim());
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return Err("reply contained no JSON object".to_string()),
    };

    let analysis: AiAnalysis =
        serde_json::from_str(json).map_err(|e| format!("reply was not valid analysis JSON: {e}"))?;
    if analysis.executive_summary.trim().is_empty() {
        return Err("reply had an empty executive_summary".to_string());
    }
    Ok(analysis)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub fn generate_fallback_analysis(ctx: &AnalysisContext) -> AiAnalysis {
    let s = &ctx.summary;
    let period = ctx.period_label();
    let scope = ctx.scope_label();

    if s.report_count == 0 {
        return AiAnalysis {
            executive_summary: format!(
                "No service reports were submitted for {scope} in {period}."
            ),
            key_findings: vec![
                "There is no attendance or giving data for this period.".to_string(),
            ],
            recommendations: vec![
                "Follow up with assembly secretaries to submit their monthly service reports."
                    .to_string(),
            ],
            attendance_insights: None,
            financial_outlook: None,
        };
    }

    let executive_summary = format!(
        "For {period}, {scope} recorded total income of {} across {} services in {} report(s), \
         with tithes contributing {}% and an average attendance of {} per service. \
         The financial health score is {}/10 ({}).",
        format_amount(s.total_income),
        s.service_count,
        s.report_count,
        s.tithe_percentage,
        s.average_attendance,
        ctx.health.score,
        ctx.health.rating,
    );

    let mut key_findings = Vec::new();
    key_findings.push(format!(
        "Tithes totalled {} and other offerings {}.",
        format_amount(s.total_tithes),
        format_amount(s.total_offerings)
    ));
    if let Some((label, amount)) = s
        .categories
        .labelled()
        .into_iter()
        .filter(|(label, _)| *label != "Tithes")
        .max_by(|a, b| a.1.cmp(&b.1))
        .filter(|(_, amount)| *amount > Decimal::ZERO)
    {
        key_findings.push(format!(
            "{label} was the largest offering category at {}.",
            format_amount(amount)
        ));
    }
    if let Some(top) = ctx.assemblies.first() {
        if ctx.assemblies.len() > 1 {
            key_findings.push(format!(
                "{} led the district with {} ({}% of income).",
                top.assembly,
                format_amount(top.total_income),
                top.share_of_income
            ));
        }
    }
    key_findings.extend(ctx.health.strengths.iter().cloned());

    let mut recommendations: Vec<String> = ctx
        .health
        .concerns
        .iter()
        .map(|concern| format!("Review with leadership: {}.", concern.trim_end_matches('.')))
        .collect();
    if recommendations.is_empty() {
        recommendations.push(
            "Sustain current giving and attendance efforts and keep weekly records complete."
                .to_string(),
        );
    }
    if ctx.assemblies.len() > 1 {
        if let Some(lowest) = ctx.assemblies.last() {
            recommendations.push(format!(
                "Offer support to {}, which recorded the lowest income this period.",
                lowest.assembly
            ));
        }
    }

    let attendance_insights = Some(match ctx.health.metrics.attendance_growth {
        Some(g) => format!(
            "Total attendance was {} ({}{}% against the previous period).",
            s.total_attendance,
            if g > Decimal::ZERO { "+" } else { "" },
            g
        ),
        None => format!(
            "Total attendance was {}, averaging {} per service.",
            s.total_attendance, s.average_attendance
        ),
    });

    let financial_outlook = Some(match ctx.health.metrics.income_growth {
        Some(g) if g > Decimal::ZERO => format!("Income is trending upward ({g}% growth)."),
        Some(g) if g < Decimal::ZERO => format!("Income is trending downward ({g}% change)."),
        Some(_) => "Income is flat against the previous period.".to_string(),
        None => "No previous period is available for comparison.".to_string(),
    });

    AiAnalysis {
        executive_summary,
        key_findings,
        recommendations,
        attendance_insights,
        financial_outlook,
    }
}

pub fn generate_fallback_narrative(ctx: &AnalysisContext) -> String {
    let analysis = generate_fallback_analysis(ctx);
    let mut text = analysis.executive_summary;

    if !analysis.key_findings.is_empty() {
        text.push_str("\n\n");
        text.push_str(&analysis.key_findings.join(" "));
    }
    for paragraph in [analysis.attendance_insights, analysis.financial_outlook]
        .into_iter()
        .flatten()
    {
        text.push_str("\n\n");
        text.push_str(&paragraph);
    }
    if !analysis.recommendations.is_empty() {
        text.push_str("\n\n");
        text.push_str(&analysis.recommendations.join(" "));
    }
    text
}

/// Produce a report for `ctx`, preferring cache, then the model, then the template.
pub async fn generate_ai_analysis(
    client: Option<&LlmClient>,
    cache: Option<&ReportCache>,
    ctx: &AnalysisContext,
    kind: ReportKind,
) -> GeneratedReport {
    let Some(client) = client else {
        return fallback_report(ctx, kind, "AI provider is not configured".to_string());
    };

    let prompt = create_enhanced_analysis_prompt(ctx, kind);
    let key = report_cache::cache_key(kind.as_str(), &prompt.system, &prompt.user);

    if let Some(cache) = cache {
        if let Some(cached) = cache.get(&key).await {
            match interpret_reply(kind, &cached) {
                Ok((analysis, narrative)) => {
                    tracing::debug!(kind = kind.as_str(), "AI report served from cache");
                    return ai_report(
                        ctx,
                        kind,
                        ReportSource::Cache,
                        client,
                        analysis,
                        narrative,
                    );
                }
                Err(reason) => tracing::warn!(%reason, "Discarding unusable cached AI report"),
            }
        }
    }

    let reply = match client.complete(&prompt.system, &prompt.user).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(
                error = %e,
                model = client.model(),
                "AI completion failed, using fallback report"
            );
            return fallback_report(ctx, kind, e.to_string());
        }
    };

    match interpret_reply(kind, &reply) {
        Ok((analysis, narrative)) => {
            if let Some(cache) = cache {
                cache.put(&key, &reply).await;
            }
            ai_report(ctx, kind, ReportSource::Ai, client, analysis, narrative)
        }
        Err(reason) => {
            tracing::warn!(
                %reason,
                model = client.model(),
                "AI reply unusable, using fallback report"
            );
            fallback_report(ctx, kind, reason)
        }
    }
}

fn interpret_reply(
    kind: ReportKind,
    reply: &str,
) -> Result<(Option<AiAnalysis>, Option<String>), String> {
    match kind {
        ReportKind::Analysis => parse_analysis_response(reply).map(|a| (Some(a), None)),
        ReportKind::Narrative => {
            let text = reply.trim();
            if text.is_empty() {
                Err("reply was empty".to_string())
            } else {
                Ok((None, Some(text.to_string())))
            }
        }
    }
}

fn ai_report(
    ctx: &AnalysisContext,
    kind: ReportKind,
    source: ReportSource,
    client: &LlmClient,
    analysis: Option<AiAnalysis>,
    narrative: Option<String>,
) -> GeneratedReport {
    GeneratedReport {
        kind,
        source,
        period: ctx.period_label(),
        scope: ctx.scope_label(),
        health_score: ctx.health.score,
        model: Some(client.model().to_string()),
        analysis,
        narrative,
        fallback_reason: None,
        generated_at: Utc::now(),
    }
}

fn fallback_report(ctx: &AnalysisContext, kind: ReportKind, reason: String) -> GeneratedReport {
    let (analysis, narrative) = match kind {
        ReportKind::Analysis => (Some(generate_fallback_analysis(ctx)), None),
        ReportKind::Narrative => (None, Some(generate_fallback_narrative(ctx))),
    };
    GeneratedReport {
        kind,
        source: ReportSource::Fallback,
        period: ctx.period_label(),
        scope: ctx.scope_label(),
        health_score: ctx.health.score,
        model: None,
        analysis,
        narrative,
        fallback_reason: Some(reason),
        generated_at: Utc::now(),
    }
}

/// `12345.5` becomes `"12,345.50"`.
pub fn format_amount(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::analysis::{self, tests::report};

    pub(crate) fn context(filters: ReportFilters) -> AnalysisContext {
        let reports = vec![
            report("Bethel Assembly", "2026-03", &[(1200, 400, 150), (1100, 350, 140)]),
            report("Zion Assembly", "2026-03", &[(600, 300, 90)]),
        ];
        let previous =
            analysis::summarize(&[report("Bethel Assembly", "2026-02", &[(1500, 500, 300)])]);
        let summary = analysis::summarize(&reports);
        AnalysisContext {
            health: analysis::analyze_financial_health(&summary, Some(&previous)),
            assemblies: analysis::analyze_assembly_performance(&reports),
            summary,
            previous: Some(previous),
            filters,
        }
    }

    fn march() -> ReportFilters {
        ReportFilters {
            month: Some("2026-03".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn prompt_contains_aggregates() {
        let prompt = create_enhanced_analysis_prompt(&context(march()), ReportKind::Analysis);
        assert!(prompt.system.contains("JSON"));
        assert!(prompt.user.contains("Period: March 2026"));
        assert!(prompt.user.contains("Total income: 3,950.00"));
        assert!(prompt.user.contains("1. Bethel Assembly"));
        assert!(prompt.user.contains("Score: "));
        assert!(prompt.user.contains("## Previous period"));
    }

    #[test]
    fn narrative_prompt_asks_for_plain_text() {
        let prompt = create_enhanced_analysis_prompt(&context(march()), ReportKind::Narrative);
        assert!(prompt.system.contains("plain text"));
    }

    #[test]
    fn period_label_variants() {
        let mut filters = ReportFilters {
            year: Some(2026),
            ..Default::default()
        };
        assert_eq!(context(filters.clone()).period_label(), "2026");
        filters.service_type = Some(crate::models::report::ServiceType::Midweek);
        assert_eq!(context(filters).period_label(), "2026 (Midweek service)");
        assert_eq!(context(ReportFilters::default()).period_label(), "all recorded periods");
    }

    #[test]
    fn parses_fenced_json_reply() {
        let reply =
            "```json\n{\"executive_summary\": \"Giving rose.\", \"key_findings\": [\"a\"]}\n```";
        let analysis = parse_analysis_response(reply).unwrap();
        assert_eq!(analysis.executive_summary, "Giving rose.");
        assert_eq!(analysis.key_findings, vec!["a".to_string()]);
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let reply = "Here is the analysis: {\"executive_summary\": \"Stable.\"} Hope this helps.";
        assert_eq!(parse_analysis_response(reply).unwrap().executive_summary, "Stable.");
    }

    #[test]
    fn rejects_unusable_replies() {
        assert!(parse_analysis_response("I cannot help with that.").is_err());
        assert!(parse_analysis_response("{\"key_findings\": []}").is_err());
        assert!(parse_analysis_response("{\"executive_summary\": \"  \"}").is_err());
    }

    #[test]
    fn fallback_analysis_is_well_formed() {
        let analysis = generate_fallback_analysis(&context(march()));
        assert!(analysis.executive_summary.contains("3,950.00"));
        assert!(analysis.executive_summary.contains("the district"));
        assert!(!analysis.key_findings.is_empty());
        assert!(!analysis.recommendations.is_empty());
        assert!(analysis
            .key_findings
            .iter()
            .any(|f| f.starts_with("Bethel Assembly led the district")));
    }

    #[test]
    fn fallback_handles_empty_period() {
        let summary = analysis::summarize(&[]);
        let ctx = AnalysisContext {
            health: analysis::analyze_financial_health(&summary, None),
            summary,
            previous: None,
            assemblies: vec![],
            filters: march(),
        };
        let analysis = generate_fallback_analysis(&ctx);
        assert!(analysis.executive_summary.starts_with("No service reports"));
        assert!(!generate_fallback_narrative(&ctx).is_empty());
    }

    #[tokio::test]
    async fn missing_client_falls_back() {
        let ctx = context(march());
        let report = generate_ai_analysis(None, None, &ctx, ReportKind::Narrative).await;
        assert_eq!(report.source, ReportSource::Fallback);
        assert!(report.narrative.as_deref().is_some_and(|n| !n.is_empty()));
        assert!(report.analysis.is_none());
        assert!(report.fallback_reason.is_some());
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(Decimal::new(123456789, 2)), "1,234,567.89");
        assert_eq!(format_amount(Decimal::from(999)), "999.00");
        assert_eq!(format_amount(Decimal::new(1000005, 3)), "1,000.01");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
        assert_eq!(format_amount(Decimal::new(-25050, 2)), "-250.50");
    }
}
