//! Course catalog and chunk types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A course in the catalog. The title is its unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Lessons ordered by number
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn lesson(&self, number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.number == number)
    }

    /// Link for a citation: the lesson link, falling back to the course link.
    pub fn citation_link(&self, lesson_number: Option<u32>) -> Option<String> {
        lesson_number
            .and_then(|n| self.lesson(n))
            .and_then(|l| l.link.clone())
            .or_else(|| self.link.clone())
    }
}

/// A lesson of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: u32,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Body text of one lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonSection {
    pub number: u32,
    pub body: String,
}

/// A parsed course document, ready for chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDocument {
    pub course: Course,

    /// Text that precedes the first lesson marker
    pub course_text: String,

    /// Lesson bodies in document order
    pub sections: Vec<LessonSection>,
}

/// The atomic retrievable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub text: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,

    /// Position within the course, sequential from 0
    pub chunk_index: usize,
}

/// A search result with its cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: CourseChunk,
    pub score: f32,
}

/// Result of a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Best-first hits, possibly empty
    Hits(Vec<SearchHit>),

    /// The course filter did not resolve to a known title
    NoMatchingCourse(String),
}

/// Whether `add_course` changed the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddCourseOutcome {
    Added { chunks: usize },
    Unchanged,
}

/// Catalog summary exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseStats {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// A document that was not ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of a folder ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub courses_added: usize,
    pub chunks_added: usize,

    /// Titles whose content hash matched the stored one
    pub unchanged: Vec<String>,

    pub skipped: Vec<SkippedDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> Course {
        Course {
            title: "Intro to X".to_string(),
            instructor: None,
            link: Some("https://example.com/x".to_string()),
            lessons: vec![
                Lesson {
                    number: 0,
                    title: "Start".to_string(),
                    link: Some("https://example.com/x/0".to_string()),
                },
                Lesson {
                    number: 1,
                    title: "Next".to_string(),
                    link: None,
                },
            ],
        }
    }

    #[test]
    fn test_citation_link_prefers_lesson() {
        let course = course();
        assert_eq!(
            course.citation_link(Some(0)).as_deref(),
            Some("https://example.com/x/0")
        );
        assert_eq!(
            course.citation_link(Some(1)).as_deref(),
            Some("https://example.com/x")
        );
        assert_eq!(
            course.citation_link(None).as_deref(),
            Some("https://example.com/x")
        );
    }
}
