//! Bounded keyword classifier for experience level (spec §4.3: "a bounded
//! keyword classifier over title and description; absence → `unknown`").
//!
//! Grounded on `intelligent-crawler::detector::run_heuristics`'s keyword
//! matching against lowercased text (`Heuristic::Keywords`), simplified from
//! that function's weighted-average scoring down to a fixed, ordered list of
//! (keyword, level) tiers, first match wins.

use crate::models::ExperienceLevel;

const EXECUTIVE_KEYWORDS: &[&str] = &["chief", "vp", "vice president", "head of", "cxo", "cto", "ceo"];
const LEAD_KEYWORDS: &[&str] = &["lead", "principal", "staff", "architect", "manager"];
const SENIOR_KEYWORDS: &[&str] = &["senior", "sr.", "sr ", "iii"];
const ENTRY_KEYWORDS: &[&str] = &["junior", "jr.", "entry level", "entry-level", "intern", "graduate", "new grad"];
const MID_KEYWORDS: &[&str] = &["mid level", "mid-level", "ii "];

/// Infer an experience level from a posting's title and description.
/// Checked in seniority order (executive, lead, senior, entry, mid) so that
/// e.g. "Senior Engineering Manager" classifies as `Lead`, matching the more
/// specific role-ladder keyword.
pub fn infer(title: &str, description: Option<&str>) -> ExperienceLevel {
    let haystack = match description {
        Some(d) => format!("{} {}", title.to_lowercase(), d.to_lowercase()),
        None => title.to_lowercase(),
    };

    if EXECUTIVE_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return ExperienceLevel::Executive;
    }
    if LEAD_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return ExperienceLevel::Lead;
    }
    if SENIOR_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return ExperienceLevel::Senior;
    }
    if ENTRY_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return ExperienceLevel::Entry;
    }
    if MID_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return ExperienceLevel::Mid;
    }
    ExperienceLevel::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_senior() {
        assert_eq!(infer("Senior Rust Engineer", None), ExperienceLevel::Senior);
    }

    #[test]
    fn detects_executive_over_lead() {
        assert_eq!(infer("VP of Engineering", None), ExperienceLevel::Executive);
    }

    #[test]
    fn detects_lead_over_senior_in_title() {
        assert_eq!(infer("Senior Engineering Manager", None), ExperienceLevel::Lead);
    }

    #[test]
    fn detects_entry() {
        assert_eq!(infer("Junior Developer", None), ExperienceLevel::Entry);
    }

    #[test]
    fn falls_back_to_unknown() {
        assert_eq!(infer("Software Engineer", None), ExperienceLevel::Unknown);
    }

    #[test]
    fn checks_description_too() {
        assert_eq!(
            infer("Engineer", Some("This is a principal-level role")),
            ExperienceLevel::Lead
        );
    }
}
