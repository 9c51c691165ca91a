use std::collections::HashMap;

use crate::models::{ColumnProfile, PatternProfile, PatternType, Priority, Suggestion};

impl PatternType {
    pub fn suggested_actions(&self, column: &str) -> Vec<String> {
        let actions: [String; 3] = match self {
            PatternType::Email => [
                "Search company website contact pages".to_string(),
                "Check professional networks (LinkedIn)".to_string(),
                "Use email format patterns from existing data".to_string(),
            ],
            PatternType::Phone => [
                "Search company directory".to_string(),
                "Check official business listings".to_string(),
                "Use phone number validation services".to_string(),
            ],
            PatternType::Address => [
                "Use geocoding services".to_string(),
                "Search official business registries".to_string(),
                "Check Google Maps/Places API".to_string(),
            ],
            PatternType::Url => [
                "Search company name + 'website'".to_string(),
                "Check domain variations".to_string(),
                "Use web directory services".to_string(),
            ],
            PatternType::Numeric | PatternType::Text | PatternType::Unknown => [
                format!("Web search for '{}' information", column),
                "Check related databases".to_string(),
                "Use data completion services".to_string(),
            ],
        };
        actions.into()
    }
}

impl From<&ColumnProfile> for Priority {
    fn from(profile: &ColumnProfile) -> Self {
        if profile.is_critical {
            Priority::High
        } else {
            Priority::Medium
        }
    }
}

/// One suggestion per column with missing values, in column order.
pub fn synthesize(profiles: &[ColumnProfile], patterns: &[PatternProfile]) -> Vec<Suggestion> {
    let pattern_types: HashMap<&str, PatternType> = patterns
        .iter()
        .map(|p| (p.column_name.as_str(), p.pattern_type))
        .collect();

    profiles
        .iter()
        .filter(|profile| profile.missing_count > 0)
        .map(|profile| {
            let pattern_type = pattern_types
                .get(profile.name.as_str())
                .copied()
                .unwrap_or(PatternType::Unknown);

            Suggestion {
                column: profile.name.clone(),
                missing_count: profile.missing_count,
                priority: Priority::from(profile),
                suggested_actions: pattern_type.suggested_actions(&profile.name),
            }
        })
        .collect()
}
