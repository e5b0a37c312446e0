//! Sentence-aware text chunking with exact character overlap.
//!
//! Sizes are counted in Unicode scalar values. Every chunk after the first
//! in a run starts with the last `chunk_overlap` characters of its
//! predecessor (or the whole predecessor when it is shorter).

use crate::config::ChunkConfig;
use crate::types::{CourseChunk, CourseDocument};
use unicode_segmentation::UnicodeSegmentation;

/// Chunk every lesson of a document.
///
/// Course-level text (before the first lesson marker) yields chunks with
/// `lesson_number = None`. Overlap never crosses a lesson boundary, and
/// `chunk_index` runs sequentially across the whole course.
pub fn chunk_document(document: &CourseDocument, config: &ChunkConfig) -> Vec<CourseChunk> {
    let title = &document.course.title;
    let mut chunks = Vec::new();

    let mut push = |texts: Vec<String>, lesson_number: Option<u32>| {
        for text in texts {
            let chunk_index = chunks.len();
            chunks.push(CourseChunk {
                text,
                course_title: title.clone(),
                lesson_number,
                chunk_index,
            });
        }
    };

    push(chunk_text(&document.course_text, config), None);
    for section in &document.sections {
        push(chunk_text(&section.body, config), Some(section.number));
    }

    tracing::debug!("Chunked course '{}' into {} chunks", title, chunks.len());
    chunks
}

/// Split text into overlapping chunks on sentence boundaries.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let mut builder = ChunkBuilder::new(config);
    for sentence in text.unicode_sentences() {
        let sentence = collapse_whitespace(sentence);
        if !sentence.is_empty() {
            builder.push(sentence);
        }
    }
    builder.finish()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Last `n` characters of `text`.
fn tail(text: &str, n: usize) -> String {
    let len = char_len(text);
    text.chars().skip(len.saturating_sub(n)).collect()
}

struct ChunkBuilder {
    size: usize,
    overlap: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
    /// Whether `current` holds anything beyond the overlap prefix
    has_new: bool,
}

impl ChunkBuilder {
    fn new(config: &ChunkConfig) -> Self {
        Self {
            size: config.chunk_size(),
            overlap: config.chunk_overlap(),
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
            has_new: false,
        }
    }

    fn append(&mut self, piece: &str, separator: bool) {
        if separator {
            self.current.push(' ');
            self.current_len += 1;
        }
        self.current.push_str(piece);
        self.current_len += char_len(piece);
        self.has_new = true;
    }

    fn emit(&mut self) {
        let prefix = tail(&self.current, self.overlap);
        let chunk = std::mem::replace(&mut self.current, prefix);
        self.current_len = char_len(&self.current);
        self.chunks.push(chunk);
        self.has_new = false;
    }

    fn push(&mut self, sentence: String) {
        let mut pending = Some(sentence);

        while let Some(piece) = pending.take() {
            let piece_len = char_len(&piece);
            let separator = self.current_len > 0;
            let needed = piece_len + usize::from(separator);

            if self.current_len + needed <= self.size {
                self.append(&piece, separator);
            } else if self.has_new {
                self.emit();
                pending = Some(piece);
            } else {
                // Only the overlap prefix is buffered and the piece still
                // does not fit: take as much of it as the remaining room allows.
                let (separator, room) = match self.size - self.current_len {
                    room if separator && room > 1 => (true, room - 1),
                    room => (false, room),
                };
                let (head, rest) = split_to_fit(&piece, room);
                self.append(&head, separator);
                if !rest.is_empty() {
                    pending = Some(rest);
                }
            }
        }
    }

    fn finish(mut self) -> Vec<String> {
        if self.has_new {
            self.chunks.push(self.current);
        }
        self.chunks
    }
}

/// Split `piece` into a head of at most `room` characters and the rest,
/// preferring word boundaries. A single word longer than `room` is cut.
fn split_to_fit(piece: &str, room: usize) -> (String, String) {
    let mut head = String::new();
    let mut head_len = 0;
    let mut words = piece.split(' ').peekable();

    while let Some(word) = words.peek() {
        let word_len = char_len(word);
        let needed = word_len + usize::from(head_len > 0);
        if head_len + needed > room {
            break;
        }
        if head_len > 0 {
            head.push(' ');
        }
        head.push_str(word);
        head_len += needed;
        words.next();
    }

    if head.is_empty() {
        // First word alone exceeds the room
        let first = words.next().unwrap_or_default();
        let cut: String = first.chars().take(room).collect();
        let remainder: String = first.chars().skip(room).collect();
        let rest: Vec<&str> = std::iter::once(remainder.as_str())
            .chain(words)
            .filter(|w| !w.is_empty())
            .collect();
        return (cut, rest.join(" "));
    }

    (head, words.collect::<Vec<_>>().join(" "))
}
