//! Accumulated conversation context and merge rules
//!
//! Scalars may be overwritten but never unset. Set-valued keys are
//! append-only: they never shrink and never hold duplicates.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetAudience {
    #[serde(rename = "k12")]
    K12,
    #[serde(rename = "higher_education")]
    HigherEducation,
}

impl TargetAudience {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetAudience::K12 => "k12",
            TargetAudience::HigherEducation => "higher_education",
        }
    }
}

impl fmt::Display for TargetAudience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered set of strings that only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AppendOnlySet(Vec<String>);

impl AppendOnlySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning `true` if it was not already present.
    /// Blank values are ignored.
    pub fn insert(&mut self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || self.contains(value) {
            return false;
        }
        self.0.push(value.to_string());
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for AppendOnlySet {
    fn from(values: Vec<String>) -> Self {
        let mut set = Self::new();
        for value in &values {
            set.insert(value);
        }
        set
    }
}

impl From<AppendOnlySet> for Vec<String> {
    fn from(set: AppendOnlySet) -> Self {
        set.0
    }
}

impl<'a> FromIterator<&'a str> for AppendOnlySet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// Everything learned about the user's request so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationContext {
    pub skill_level: Option<SkillLevel>,
    pub target_audience: Option<TargetAudience>,
    /// The user expressed interest in exploring genres or styles
    pub genre_interest: Option<bool>,
    /// The user asked for respectful, authentic cultural treatment
    pub cultural_sensitivity: Option<bool>,
    pub generation_confirmed: Option<bool>,
    pub genres: AppendOnlySet,
    pub learning_objectives: AppendOnlySet,
    pub cultural_focus: AppendOnlySet,
    pub theory_concepts: AppendOnlySet,
    /// Source URLs gathered by web research, in discovery order
    pub web_research: AppendOnlySet,
}

/// An incremental update produced from a single user message (or from a
/// batch of research results).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextDelta {
    pub skill_level: Option<SkillLevel>,
    pub target_audience: Option<TargetAudience>,
    pub genre_interest: Option<bool>,
    pub cultural_sensitivity: Option<bool>,
    pub generation_confirmed: Option<bool>,
    pub genres: Vec<String>,
    pub learning_objectives: Vec<String>,
    pub cultural_focus: Vec<String>,
    pub theory_concepts: Vec<String>,
    pub web_research: Vec<String>,
}

impl ContextDelta {
    pub fn is_empty(&self) -> bool {
        self.skill_level.is_none()
            && self.target_audience.is_none()
            && self.genre_interest.is_none()
            && self.cultural_sensitivity.is_none()
            && self.generation_confirmed.is_none()
            && self.genres.is_empty()
            && self.learning_objectives.is_empty()
            && self.cultural_focus.is_empty()
            && self.theory_concepts.is_empty()
            && self.web_research.is_empty()
    }

    pub fn research(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            web_research: urls.into_iter().collect(),
            ..Self::default()
        }
    }
}

fn overwrite<T: Copy + PartialEq>(slot: &mut Option<T>, value: Option<T>) -> Option<T> {
    match value {
        Some(v) if *slot != Some(v) => {
            *slot = Some(v);
            Some(v)
        }
        _ => None,
    }
}

fn extend(set: &mut AppendOnlySet, values: &[String]) -> Vec<String> {
    values
        .iter()
        .filter(|v| set.insert(v))
        .map(|v| v.trim().to_string())
        .collect()
}

impl ConversationContext {
    /// Merge a delta into this context.
    ///
    /// Returns the part of the delta that actually changed something: scalars
    /// whose value differs and set entries not previously recorded.
    pub fn apply(&mut self, delta: &ContextDelta) -> ContextDelta {
        ContextDelta {
            skill_level: overwrite(&mut self.skill_level, delta.skill_level),
            target_audience: overwrite(&mut self.target_audience, delta.target_audience),
            genre_interest: overwrite(&mut self.genre_interest, delta.genre_interest),
            cultural_sensitivity: overwrite(
                &mut self.cultural_sensitivity,
                delta.cultural_sensitivity,
            ),
            generation_confirmed: overwrite(
                &mut self.generation_confirmed,
                delta.generation_confirmed,
            ),
            genres: extend(&mut self.genres, &delta.genres),
            learning_objectives: extend(&mut self.learning_objectives, &delta.learning_objectives),
            cultural_focus: extend(&mut self.cultural_focus, &delta.cultural_focus),
            theory_concepts: extend(&mut self.theory_concepts, &delta.theory_concepts),
            web_research: extend(&mut self.web_research, &delta.web_research),
        }
    }
}
