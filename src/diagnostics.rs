// ABOUTME: Diagnostics accumulator for non-fatal warnings during an apply.
// ABOUTME: Collects issues that should be shown without failing the run.

/// Collects non-fatal warnings during apply operations.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during an apply.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Content sync finished with an error; provisioning stands.
    pub fn content_sync(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ContentSync,
            message: message.into(),
        }
    }

    /// State housekeeping issue (e.g. lock cleanup).
    pub fn state(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::State,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    ContentSync,
    State,
}
