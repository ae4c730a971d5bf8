//! Tracing configuration module for structured logging and observability
//!
//! Applications configure the subscriber, the library only emits events. `log`
//! records from the filesystem and download layers reach the same subscriber
//! through the log bridge installed by `init()`.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// `[HH:MM:SS] message` lines, one per event (default for CLI)
    Timestamped,
    /// Compact output with levels and span context
    Compact,
}

/// Stream the subscriber writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingOutput {
    Stdout,
    Stderr,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Timestamped,
            output: TracingOutput::Stdout,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set session ID for log correlation
    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",  // Default: stage transitions and results
            1 => "debug", // -v: scans, provider mapping, timings
            _ => "trace", // -vv and above
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - The filter string is invalid
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = match &self.env_filter {
            Some(env_filter) => EnvFilter::try_new(env_filter)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };
        let registry = Registry::default().with(filter);

        match (self.format, self.output) {
            (TracingFormat::Timestamped, TracingOutput::Stdout) => {
                let layer = fmt::layer()
                    .event_format(TimestampedLines)
                    .with_writer(std::io::stdout);
                registry.with(layer).try_init()?;
            },
            (TracingFormat::Timestamped, TracingOutput::Stderr) => {
                let layer = fmt::layer()
                    .event_format(TimestampedLines)
                    .with_writer(std::io::stderr);
                registry.with(layer).try_init()?;
            },
            (TracingFormat::Compact, TracingOutput::Stdout) => {
                let layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stdout)
                    .compact();
                registry.with(layer).try_init()?;
            },
            (TracingFormat::Compact, TracingOutput::Stderr) => {
                let layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "🚀 Session started");
        }

        Ok(())
    }
}

/// Event formatter printing `[HH:MM:SS] message` in local time
///
/// Warnings and errors carry their level after the timestamp. Each event is
/// written as one complete line, so line-buffered stdout flushes it immediately.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampedLines;

#[cfg(feature = "cli")]
impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for TimestampedLines
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        write!(writer, "{} ", timestamp_prefix(chrono::Local::now()))?;
        let level = *event.metadata().level();
        if level <= tracing::Level::WARN {
            write!(writer, "{level}: ")?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `[HH:MM:SS]` for a point in time
pub fn timestamp_prefix<Tz>(time: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("[{}]", time.format("%H:%M:%S"))
}

/// Initialize tracing with CLI defaults: timestamped lines on stdout
///
/// # Errors
/// - A global subscriber is already installed
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    let session_id = uuid::Uuid::new_v4().to_string();

    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Timestamped)
        .with_output(TracingOutput::Stdout)
        .with_session_id(session_id)
        .init()
}
