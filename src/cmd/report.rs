//! Human-readable rendering of results and decisions.

use console::style;
use mergegate::auditor::{Verdict, VerificationResult};
use mergegate::gate::{VerificationInfo, VerificationStatus};

fn styled_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => style(verdict).green().bold().to_string(),
        Verdict::Fail => style(verdict).red().bold().to_string(),
        Verdict::NeedsHuman => style(verdict).yellow().bold().to_string(),
    }
}

fn styled_status(status: VerificationStatus) -> String {
    match status {
        VerificationStatus::Verified | VerificationStatus::Skipped => {
            style(status).green().bold().to_string()
        }
        VerificationStatus::Rejected => style(status).red().bold().to_string(),
        VerificationStatus::NeedsReview | VerificationStatus::Pending => {
            style(status).yellow().bold().to_string()
        }
    }
}

pub fn review_mode(independent: bool) -> &'static str {
    if independent {
        "Independent (different model)"
    } else {
        "Same-model review"
    }
}

fn print_list(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{}:", heading);
    for item in items {
        println!("  - {}", item);
    }
    println!();
}

pub fn print_result(result: &VerificationResult) {
    println!("Verdict: {}", styled_verdict(result.verdict));
    println!("Confidence: {:.0}%", result.confidence * 100.0);
    println!("Reviewed by: {}", result.reviewed_by);
    println!("Verification type: {}", review_mode(result.is_independent));
    println!("Duration: {}ms", result.duration.as_millis());
    println!();

    print_list("Issues", &result.issues);
    print_list("Suggestions", &result.suggestions);
}

pub fn print_info(info: &VerificationInfo) {
    println!("Status: {}", styled_status(info.status));

    if !info.reviewed_by.is_empty() {
        println!("Reviewed by: {}", info.reviewed_by);
        println!("Verification type: {}", review_mode(info.is_independent));
    }
    if info.confidence > 0.0 {
        println!("Confidence: {:.0}%", info.confidence * 100.0);
    }
    if let Some(at) = info.verified_at {
        println!("Verified at: {}", at.to_rfc3339());
    }
    println!();

    print_list("Issues", &info.issues);
    print_list("Suggestions", &info.suggestions);
}

pub fn availability_mark(available: bool) -> String {
    if available {
        style("[x]").green().to_string()
    } else {
        style("[ ]").dim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_mode() {
        assert!(review_mode(true).starts_with("Independent"));
        assert_eq!(review_mode(false), "Same-model review");
    }

    #[test]
    fn test_availability_mark_contains_box() {
        assert!(availability_mark(true).contains("[x]"));
        assert!(availability_mark(false).contains("[ ]"));
    }
}
