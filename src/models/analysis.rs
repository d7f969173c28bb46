use serde::{Deserialize, Serialize};

/// Personality read of a developer profile.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProfileAnalysis {
    pub archetype: String,
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub is_fallback: bool,
}

impl ProfileAnalysis {
    pub fn fallback(login: &str) -> Self {
        Self {
            archetype: "Unclassified".to_string(),
            summary: format!("We couldn't analyse @{login} right now. Please try again later."),
            strengths: Vec::new(),
            focus_areas: Vec::new(),
            is_fallback: true,
        }
    }
}

/// A widget theme suggested for a profile.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ThemeRecommendation {
    pub theme: String,
    pub reason: String,
    #[serde(default)]
    pub is_fallback: bool,
}

impl ThemeRecommendation {
    pub fn fallback(theme: &str) -> Self {
        Self {
            theme: theme.to_string(),
            reason: "A safe choice that reads well on any profile.".to_string(),
            is_fallback: true,
        }
    }
}
