//! Diagnostic sinks

use heapless::HistoryBuffer;

use super::Diagnostic;

/// Write-only destination for diagnostic reports
pub trait DiagnosticSink {
    /// Deliver one report
    fn emit(&mut self, diagnostic: &Diagnostic);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for &mut T {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        (**self).emit(diagnostic)
    }
}

/// Logs reports over defmt
#[cfg(feature = "defmt")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefmtSink;

#[cfg(feature = "defmt")]
impl DiagnosticSink for DefmtSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.severity() {
            super::Severity::Error => defmt::error!("tickwork: {}", diagnostic),
            super::Severity::Warning => defmt::warn!("tickwork: {}", diagnostic),
        }
    }
}

/// Keeps the most recent `N` reports
///
/// Useful on targets without a log transport (the application can show the
/// history on a display) and in tests.
pub struct HistorySink<const N: usize> {
    history: HistoryBuffer<Diagnostic, N>,
    total: u32,
}

impl<const N: usize> HistorySink<N> {
    /// Create an empty history
    pub const fn new() -> Self {
        Self {
            history: HistoryBuffer::new(),
            total: 0,
        }
    }

    /// Number of reports currently held
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Check if no report is held
    pub fn is_empty(&self) -> bool {
        self.history.len() == 0
    }

    /// Number of reports received since creation
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Most recent report
    pub fn recent(&self) -> Option<&Diagnostic> {
        self.history.recent()
    }

    /// Reports from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.history.oldest_ordered()
    }

    /// Forget all held reports
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl<const N: usize> Default for HistorySink<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DiagnosticSink for HistorySink<N> {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        self.history.write(*diagnostic);
        self.total = self.total.saturating_add(1);
    }
}
