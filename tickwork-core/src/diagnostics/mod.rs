//! Rate-limited diagnostics
//!
//! Components report problems through a [`Reporter`]. The application builds
//! one [`Diagnostics`] value around a [`DiagnosticSink`] and hands a shared
//! reference to every component, so a single throttle guards the sink.

pub mod sink;

use core::cell::{Cell, RefCell};

use crate::config::EngineConfig;
use crate::error::{Error, Warning};
use tickwork_hal::{elapsed, Tick};

pub use sink::{DiagnosticSink, HistorySink};

#[cfg(feature = "defmt")]
pub use sink::DefmtSink;

/// Minimum ticks between two identical reports
pub const DEFAULT_REPORT_WINDOW: Tick = 500;

/// Report severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    Warning,
    Error,
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kind {
    Error(Error),
    Warning(Warning),
}

/// A single diagnostic report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostic {
    /// Error or warning raised
    pub kind: Kind,
    /// Offending index, channel or value (if any)
    pub context: Option<i32>,
    /// Name of the operation that raised it (if any)
    pub label: Option<&'static str>,
}

impl Diagnostic {
    /// Create an error report
    pub const fn error(error: Error) -> Self {
        Self {
            kind: Kind::Error(error),
            context: None,
            label: None,
        }
    }

    /// Create a warning report
    pub const fn warning(warning: Warning) -> Self {
        Self {
            kind: Kind::Warning(warning),
            context: None,
            label: None,
        }
    }

    /// Attach a context value
    pub const fn with_context(mut self, context: i32) -> Self {
        self.context = Some(context);
        self
    }

    /// Attach an operation label
    pub const fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Severity of this report
    pub const fn severity(&self) -> Severity {
        match self.kind {
            Kind::Error(_) => Severity::Error,
            Kind::Warning(_) => Severity::Warning,
        }
    }

    /// Numeric code of this report
    pub const fn code(&self) -> u8 {
        match self.kind {
            Kind::Error(e) => e.code(),
            Kind::Warning(w) => w.code(),
        }
    }
}

/// Something that accepts diagnostic reports
///
/// Takes `&self` so one reporter can be shared by every component.
pub trait Reporter {
    /// Report a diagnostic observed at tick `now`
    fn report(&self, now: Tick, diagnostic: Diagnostic);
}

/// Discards every report
impl Reporter for () {
    fn report(&self, _now: Tick, _diagnostic: Diagnostic) {}
}

impl<T: Reporter + ?Sized> Reporter for &T {
    fn report(&self, now: Tick, diagnostic: Diagnostic) {
        (**self).report(now, diagnostic)
    }
}

/// Rate-limiting reporter
///
/// Forwards reports to its sink, dropping a report when the previous one had
/// the same severity and code and arrived less than `window` ticks earlier.
pub struct Diagnostics<S> {
    sink: RefCell<S>,
    window: Tick,
    /// Severity, code and tick of the last forwarded report
    last: Cell<Option<(Severity, u8, Tick)>>,
    suppressed: Cell<u32>,
}

impl<S: DiagnosticSink> Diagnostics<S> {
    /// Create a reporter with the default window
    pub const fn new(sink: S) -> Self {
        Self::with_window(sink, DEFAULT_REPORT_WINDOW)
    }

    /// Create a reporter with a custom window
    pub const fn with_window(sink: S, window: Tick) -> Self {
        Self {
            sink: RefCell::new(sink),
            window,
            last: Cell::new(None),
            suppressed: Cell::new(0),
        }
    }

    /// Create a reporter using the configured window
    pub const fn from_config(sink: S, config: &EngineConfig) -> Self {
        Self::with_window(sink, config.report_window)
    }

    /// Throttle window in ticks
    pub fn window(&self) -> Tick {
        self.window
    }

    /// Number of reports dropped by the throttle
    pub fn suppressed(&self) -> u32 {
        self.suppressed.get()
    }

    /// Inspect the sink
    ///
    /// Returns `None` if the sink is currently emitting.
    pub fn with_sink<T>(&self, f: impl FnOnce(&S) -> T) -> Option<T> {
        self.sink.try_borrow().ok().map(|sink| f(&sink))
    }

    /// Consume the reporter and return its sink
    pub fn into_inner(self) -> S {
        self.sink.into_inner()
    }

    fn is_throttled(&self, now: Tick, diagnostic: &Diagnostic) -> bool {
        match self.last.get() {
            Some((severity, code, at)) => {
                severity == diagnostic.severity()
                    && code == diagnostic.code()
                    && elapsed(now, at) < self.window
            }
            None => false,
        }
    }
}

impl<S: DiagnosticSink> Reporter for Diagnostics<S> {
    fn report(&self, now: Tick, diagnostic: Diagnostic) {
        if self.is_throttled(now, &diagnostic) {
            self.suppressed.set(self.suppressed.get().saturating_add(1));
            return;
        }

        self.last
            .set(Some((diagnostic.severity(), diagnostic.code(), now)));

        // A sink that reports from inside emit() would re-enter; drop those
        if let Ok(mut sink) = self.sink.try_borrow_mut() {
            sink.emit(&diagnostic);
        }
    }
}
