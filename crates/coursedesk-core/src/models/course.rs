//! Course catalog models.
//!
//! The course service stores category and level as free-form strings, so
//! `Course` keeps them as `String`. `CourseCategory` and `CourseLevel` hold the
//! values the admin UI offers when creating, editing or filtering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Thumbnail used when a draft doesn't provide one
pub const DEFAULT_THUMBNAIL_URL: &str = "https://dummyjson.com/image/150";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: String,
}

impl Course {
    /// Build a course from an existing id and edited draft fields.
    pub fn from_draft(id: impl Into<String>, draft: CourseDraft) -> Self {
        Self {
            id: id.into(),
            title: draft.title,
            category: draft.category,
            level: draft.level,
            description: draft.description,
            thumbnail: draft.thumbnail,
        }
    }

    pub fn to_draft(&self) -> CourseDraft {
        CourseDraft {
            title: self.title.clone(),
            category: self.category.clone(),
            level: self.level.clone(),
            description: self.description.clone(),
            thumbnail: self.thumbnail.clone(),
        }
    }

    /// Color tag for the level column
    pub fn level_color(&self) -> &'static str {
        self.level
            .parse::<CourseLevel>()
            .map(|level| level.color())
            .unwrap_or("gray")
    }
}

/// A course that hasn't been assigned an id yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub title: String,
    pub category: String,
    pub level: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: String,
}

impl CourseDraft {
    /// Check the fields the course form marks as required.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Please enter course title!".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("Please select category!".to_string());
        }
        if self.level.trim().is_empty() {
            return Err("Please select level!".to_string());
        }
        Ok(())
    }

    /// Fill in the default thumbnail when none was given.
    pub fn with_default_thumbnail(mut self) -> Self {
        if self.thumbnail.trim().is_empty() {
            self.thumbnail = DEFAULT_THUMBNAIL_URL.to_string();
        }
        self
    }
}

/// Optional filters for the course list. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    pub title: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
}

impl CourseFilter {
    fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| !v.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        Self::non_empty(&self.title)
    }

    pub fn category(&self) -> Option<&str> {
        Self::non_empty(&self.category)
    }

    pub fn level(&self) -> Option<&str> {
        Self::non_empty(&self.level)
    }

    /// Case-insensitive title substring, exact category and level.
    pub fn matches(&self, course: &Course) -> bool {
        if let Some(title) = self.title() {
            if !course.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = self.category() {
            if course.category != category {
                return false;
            }
        }
        if let Some(level) = self.level() {
            if course.level != level {
                return false;
            }
        }
        true
    }
}

/// One page of courses plus the total number of matching courses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoursePage {
    pub data: Vec<Course>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourseCategory {
    Speaking,
    Vocabulary,
    Grammar,
    FourSkills,
    Writing,
}

impl CourseCategory {
    pub const ALL: [CourseCategory; 5] = [
        CourseCategory::Speaking,
        CourseCategory::Vocabulary,
        CourseCategory::Grammar,
        CourseCategory::FourSkills,
        CourseCategory::Writing,
    ];

    /// Value stored by the course service
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseCategory::Speaking => "SPEAKING",
            CourseCategory::Vocabulary => "VOCABULARY",
            CourseCategory::Grammar => "GRAMMAR",
            CourseCategory::FourSkills => "4SKILLS",
            CourseCategory::Writing => "WRITING",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CourseCategory::FourSkills => "4 Skills",
            other => other.as_str(),
        }
    }
}

impl FromStr for CourseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(' ', "");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl fmt::Display for CourseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
    TotalComprehension,
    Elementary,
    UpperIntermediate,
}

impl CourseLevel {
    pub const ALL: [CourseLevel; 6] = [
        CourseLevel::Beginner,
        CourseLevel::Intermediate,
        CourseLevel::Advanced,
        CourseLevel::TotalComprehension,
        CourseLevel::Elementary,
        CourseLevel::UpperIntermediate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLevel::Beginner => "Beginner",
            CourseLevel::Intermediate => "Intermediate",
            CourseLevel::Advanced => "Advanced",
            CourseLevel::TotalComprehension => "Total Comprehension",
            CourseLevel::Elementary => "Elementary",
            CourseLevel::UpperIntermediate => "Upper Intermediate",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            CourseLevel::Beginner => "green",
            CourseLevel::Intermediate => "orange",
            CourseLevel::Advanced => "red",
            _ => "gray",
        }
    }
}

impl FromStr for CourseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown level: {}", s))
    }
}

impl fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MockAPI hands out string ids, other backends use numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(title: &str, category: &str, level: &str) -> Course {
        Course {
            id: "1".to_string(),
            title: title.to_string(),
            category: category.to_string(),
            level: level.to_string(),
            description: String::new(),
            thumbnail: String::new(),
        }
    }

    #[test]
    fn test_parse_course_with_numeric_and_string_ids() {
        let numeric: Course =
            serde_json::from_str(r#"{"id": 12, "title": "IELTS", "category": "WRITING", "level": "Advanced"}"#)
                .expect("Failed to parse course JSON");
        assert_eq!(numeric.id, "12");
        assert_eq!(numeric.description, "");

        let text: Course = serde_json::from_str(r#"{"id": "3", "title": "Phonics"}"#)
            .expect("Failed to parse course JSON");
        assert_eq!(text.id, "3");
    }

    #[test]
    fn test_filter_matches() {
        let c = course("Business English Speaking", "SPEAKING", "Intermediate");

        assert!(CourseFilter::default().matches(&c));
        assert!(CourseFilter {
            title: Some("english".to_string()),
            ..Default::default()
        }
        .matches(&c));
        assert!(!CourseFilter {
            category: Some("GRAMMAR".to_string()),
            ..Default::default()
        }
        .matches(&c));
        assert!(!CourseFilter {
            title: Some("speaking".to_string()),
            level: Some("Beginner".to_string()),
            ..Default::default()
        }
        .matches(&c));
        // Empty strings are treated as no filter
        assert!(CourseFilter {
            title: Some(String::new()),
            category: Some(String::new()),
            level: None,
        }
        .matches(&c));
    }

    #[test]
    fn test_category_and_level_parsing() {
        assert_eq!("4skills".parse::<CourseCategory>(), Ok(CourseCategory::FourSkills));
        assert_eq!("4 Skills".parse::<CourseCategory>(), Ok(CourseCategory::FourSkills));
        assert_eq!(CourseCategory::FourSkills.label(), "4 Skills");
        assert!("cooking".parse::<CourseCategory>().is_err());

        assert_eq!(
            "upper intermediate".parse::<CourseLevel>(),
            Ok(CourseLevel::UpperIntermediate)
        );
        assert_eq!(course("x", "GRAMMAR", "Advanced").level_color(), "red");
        assert_eq!(course("x", "GRAMMAR", "Unknown").level_color(), "gray");
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = CourseDraft {
            title: "Grammar 101".to_string(),
            category: "GRAMMAR".to_string(),
            level: "Beginner".to_string(),
            ..Default::default()
        };
        assert!(draft.validate().is_ok());

        draft.level = "  ".to_string();
        assert_eq!(draft.validate(), Err("Please select level!".to_string()));

        let draft = draft.with_default_thumbnail();
        assert_eq!(draft.thumbnail, DEFAULT_THUMBNAIL_URL);
    }
}
