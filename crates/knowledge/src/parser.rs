//! Course document parsing.
//!
//! Documents start with a header block:
//!
//! ```text
//! Course Title: <title>
//! Course Link: <url>
//! Course Instructor: <name>
//! ```
//!
//! followed by lessons, each introduced by `Lesson <n>: <title>` and an
//! optional `Lesson Link: <url>` on the very next line.

use crate::types::{Course, CourseDocument, Lesson, LessonSection};
use lectern_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

const TITLE_PREFIX: &str = "Course Title:";
const LINK_PREFIX: &str = "Course Link:";
const INSTRUCTOR_PREFIX: &str = "Course Instructor:";
const LESSON_LINK_PREFIX: &str = "Lesson Link:";

/// File extensions accepted for ingestion.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Whether a path has a supported course document extension.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read and parse a course document from disk.
pub fn parse_file(path: &Path) -> AppResult<CourseDocument> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Ingestion(format!("Failed to read {:?}: {}", path, e)))?;

    parse_course_document(&raw)
        .map_err(|e| match e {
            AppError::Ingestion(msg) => AppError::Ingestion(format!("{:?}: {}", path, msg)),
            other => other,
        })
}

/// Parse the text of a course document.
///
/// # Errors
/// Returns `AppError::Ingestion` when the `Course Title:` header is missing
/// or empty.
pub fn parse_course_document(text: &str) -> AppResult<CourseDocument> {
    let lines: Vec<&str> = text.lines().collect();
    let mut pos = 0;

    let mut title = None;
    let mut link = None;
    let mut instructor = None;

    // Header block: leading blank lines and known header keys, in any order
    while pos < lines.len() {
        let line = lines[pos].trim();
        if line.is_empty() {
            pos += 1;
        } else if let Some(value) = header_value(line, TITLE_PREFIX) {
            title = Some(value);
            pos += 1;
        } else if let Some(value) = header_value(line, LINK_PREFIX) {
            link = Some(value);
            pos += 1;
        } else if let Some(value) = header_value(line, INSTRUCTOR_PREFIX) {
            instructor = Some(value);
            pos += 1;
        } else {
            break;
        }
    }

    let title = title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Ingestion("missing 'Course Title:' header".to_string()))?;

    let mut course_text: Vec<&str> = Vec::new();
    let mut lessons: Vec<Lesson> = Vec::new();
    let mut sections: Vec<LessonSection> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    while pos < lines.len() {
        let line = lines[pos];
        pos += 1;

        if let Some((number, lesson_title)) = parse_lesson_header(line) {
            flush_section(&mut sections, &mut body);

            let mut lesson_link = None;
            if let Some(next) = lines.get(pos) {
                if let Some(value) = header_value(next.trim(), LESSON_LINK_PREFIX) {
                    lesson_link = Some(value).filter(|v| !v.is_empty());
                    pos += 1;
                }
            }

            lessons.push(Lesson {
                number,
                title: lesson_title,
                link: lesson_link,
            });
            sections.push(LessonSection {
                number,
                body: String::new(),
            });
        } else if sections.is_empty() {
            course_text.push(line);
        } else {
            body.push(line);
        }
    }
    flush_section(&mut sections, &mut body);

    lessons.sort_by_key(|l| l.number);

    tracing::debug!(
        "Parsed course '{}' with {} lessons",
        title,
        lessons.len()
    );

    Ok(CourseDocument {
        course: Course {
            title,
            instructor: instructor.filter(|v| !v.is_empty()),
            link: link.filter(|v| !v.is_empty()),
            lessons,
        },
        course_text: course_text.join("\n").trim().to_string(),
        sections,
    })
}

fn flush_section(sections: &mut [LessonSection], body: &mut Vec<&str>) {
    if let Some(section) = sections.last_mut() {
        section.body = body.join("\n").trim().to_string();
    }
    body.clear();
}

fn header_value(line: &str, prefix: &str) -> Option<String> {
    line.strip_prefix(prefix).map(|v| v.trim().to_string())
}

/// Parse `Lesson <n>: <title>`.
fn parse_lesson_header(line: &str) -> Option<(u32, String)> {
    let rest = line.trim().strip_prefix("Lesson ")?;
    let (number, title) = rest.split_once(':')?;
    let number = number.trim().parse::<u32>().ok()?;
    Some((number, title.trim().to_string()))
}
