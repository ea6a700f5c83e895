//! Progress reporting trait and events for a conversion run.

/// Stage of a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Optimize,
    Compose,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Optimize => "optimize",
            Stage::Compose => "compose",
        }
    }
}

/// Event emitted once per processed item.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub current: u64,
    pub total: u64,
    pub message: Option<String>,
}

/// Trait for receiving progress updates. Implement this to drive progress
/// bars or other status displays.
pub trait ProgressHandler {
    fn on_progress(&self, event: ProgressEvent);
}

/// Helper to emit a progress event if a handler is provided.
pub fn emit_progress(
    handler: Option<&dyn ProgressHandler>,
    stage: Stage,
    current: u64,
    total: u64,
    message: Option<&str>,
) {
    if let Some(h) = handler {
        h.on_progress(ProgressEvent {
            stage,
            current,
            total,
            message: message.map(|s| s.to_string()),
        });
    }
}
