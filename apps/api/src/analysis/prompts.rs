use crate::models::job::{Job, RoundStatus};

/// Analysis prompt template. Placeholders are replaced by `build_analysis_prompt`.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyse this job application and the candidate's own notes about it.

APPLICATION
- Title: {jobtitle}
- Company: {company}
- Location: {location}
- Type: {jobtype}
- Salary: {salary}
- Interview rounds:
{rounds}

CANDIDATE NOTES
{review}

TASK
1. Summarise where the application stands.
2. Point out what the round outcomes suggest about strengths and weak spots.
3. Give 3-5 concrete next steps for this application.
Keep it under 400 words."#;

fn status_label(status: RoundStatus) -> &'static str {
    match status {
        RoundStatus::Pending => "pending",
        RoundStatus::Passed => "passed",
        RoundStatus::Failed => "failed",
    }
}

fn or_unspecified(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => "not specified",
    }
}

pub fn build_analysis_prompt(job: &Job, review: Option<&str>) -> String {
    let rounds = if job.round_status.0.is_empty() {
        "  (no rounds recorded)".to_string()
    } else {
        job.round_status
            .0
            .iter()
            .map(|(round, status)| format!("  - {round}: {}", status_label(*status)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    ANALYSIS_PROMPT_TEMPLATE
        .replace("{jobtitle}", &job.jobtitle)
        .replace("{company}", &job.company)
        .replace("{location}", or_unspecified(job.location.as_deref()))
        .replace("{jobtype}", &job.jobtype)
        .replace("{salary}", or_unspecified(job.salary.as_deref()))
        .replace("{rounds}", &rounds)
        .replace("{review}", or_unspecified(review))
}
