//! SQLite persistence for the course catalog and chunk vectors.

use crate::types::{Course, CourseChunk, Lesson};
use chrono::Utc;
use lectern_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    title TEXT PRIMARY KEY,
    instructor TEXT,
    link TEXT,
    lessons_json TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    embedding_model TEXT NOT NULL,
    ingested_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    course_title TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    lesson_number INTEGER,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (course_title, chunk_index),
    FOREIGN KEY (course_title) REFERENCES courses(title)
);
"#;

/// A course with its chunks as loaded from disk.
#[derive(Debug, Clone)]
pub struct StoredCourse {
    pub course: Course,
    pub content_hash: String,
    pub embedding_model: String,
    pub chunks: Vec<(CourseChunk, Vec<f32>)>,
}

/// Durable index store. All statements run on one connection.
pub struct IndexStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore").finish_non_exhaustive()
    }
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::Knowledge(format!("{}: {}", context, e))
}

impl IndexStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(db_err("Failed to open SQLite index"))?;
        tracing::debug!("Opened index store at {:?}", path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(db_err("Failed to open in-memory index"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(db_err("Failed to create tables"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Knowledge("Index store lock poisoned".to_string()))
    }

    /// Replace a course and its chunk set in a single transaction.
    pub fn replace_course(
        &self,
        course: &Course,
        content_hash: &str,
        embedding_model: &str,
        chunks: &[(CourseChunk, Vec<f32>)],
    ) -> AppResult<()> {
        let lessons_json = serde_json::to_string(&course.lessons)?;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to start transaction"))?;

        tx.execute(
            "DELETE FROM chunks WHERE course_title = ?1",
            params![course.title],
        )
        .map_err(db_err("Failed to delete chunks"))?;

        tx.execute(
            "INSERT OR REPLACE INTO courses
             (title, instructor, link, lessons_json, content_hash, embedding_model, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                course.title,
                course.instructor,
                course.link,
                lessons_json,
                content_hash,
                embedding_model,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err("Failed to insert course"))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (course_title, chunk_index, lesson_number, text, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(db_err("Failed to prepare chunk insert"))?;

            for (chunk, embedding) in chunks {
                stmt.execute(params![
                    chunk.course_title,
                    chunk.chunk_index as i64,
                    chunk.lesson_number.map(i64::from),
                    chunk.text,
                    embedding_to_bytes(embedding),
                ])
                .map_err(db_err("Failed to insert chunk"))?;
            }
        }

        tx.commit().map_err(db_err("Failed to commit course"))?;
        tracing::debug!("Stored course '{}' with {} chunks", course.title, chunks.len());
        Ok(())
    }

    /// Load every stored course with its chunks ordered by index.
    pub fn load_all(&self) -> AppResult<Vec<StoredCourse>> {
        let conn = self.lock()?;

        let mut course_stmt = conn
            .prepare(
                "SELECT title, instructor, link, lessons_json, content_hash, embedding_model
                 FROM courses ORDER BY ingested_at, title",
            )
            .map_err(db_err("Failed to prepare course query"))?;

        let rows = course_stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(db_err("Failed to query courses"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read course row"))?;

        let mut chunk_stmt = conn
            .prepare(
                "SELECT chunk_index, lesson_number, text, embedding FROM chunks
                 WHERE course_title = ?1 ORDER BY chunk_index",
            )
            .map_err(db_err("Failed to prepare chunk query"))?;

        let mut courses = Vec::with_capacity(rows.len());
        for (title, instructor, link, lessons_json, content_hash, embedding_model) in rows {
            let lessons: Vec<Lesson> = serde_json::from_str(&lessons_json)?;

            let raw = chunk_stmt
                .query_map(params![title], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })
                .map_err(db_err("Failed to query chunks"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err("Failed to read chunk row"))?;

            let mut chunks = Vec::with_capacity(raw.len());
            for (index, lesson, text, blob) in raw {
                let chunk = CourseChunk {
                    text,
                    course_title: title.clone(),
                    lesson_number: lesson.map(|n| n as u32),
                    chunk_index: index as usize,
                };
                chunks.push((chunk, bytes_to_embedding(&blob)?));
            }

            courses.push(StoredCourse {
                course: Course {
                    title,
                    instructor,
                    link,
                    lessons,
                },
                content_hash,
                embedding_model,
                chunks,
            });
        }

        Ok(courses)
    }

    /// Delete every course and chunk.
    pub fn clear(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM chunks; DELETE FROM courses;")
            .map_err(db_err("Failed to clear index"))?;
        tracing::info!("Cleared index store");
        Ok(())
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
