//! Question answering over the course index.
//!
//! `RagSystem` loads a session's history, lets the `Generator` drive the
//! model through at most one round of `search_course_content` calls, and
//! records the exchange once an answer exists.

pub mod generator;
pub mod session;
pub mod system;
pub mod tool;
pub mod types;

pub use generator::Generator;
pub use session::{SessionGuard, SessionStore};
pub use system::RagSystem;
pub use tool::{CourseSearchTool, Tool, ToolOutput, ToolRegistry, SEARCH_TOOL_NAME};
pub use types::{GeneratedAnswer, QueryResponse, Source, Turn, TurnRole};
