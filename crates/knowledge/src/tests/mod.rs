//! Pipeline tests driving `RagSystem` with a scripted model.

mod pipeline;
mod support;
