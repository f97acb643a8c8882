// Diagnostic output.
//
// Every line written to stderr has the shape `** mdbfs: <LEVEL>: <message>`
// with LEVEL one of DEBUG, INFO, WARN, FAIL. DEBUG lines are emitted only
// when the MDBFS_DEBUG environment variable is set to a non-empty value;
// every other level is always emitted.

use std::fmt;
use std::io;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

struct DiagnosticFormat;

impl<S, N> FormatEvent<S, N> for DiagnosticFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();
        let label = if level == Level::ERROR {
            "FAIL"
        } else if level == Level::WARN {
            "WARN"
        } else if level == Level::INFO {
            "INFO"
        } else {
            "DEBUG"
        };

        write!(writer, "** mdbfs: {}: ", label)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Whether debug-level diagnostics are requested via the environment.
pub fn debug_enabled() -> bool {
    std::env::var("MDBFS_DEBUG").map(|v| !v.is_empty()).unwrap_or(false)
}

/// Install the diagnostic subscriber for the whole process.
pub fn init() {
    let filter = if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(DiagnosticFormat)
        .with_writer(io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_enabled_follows_environment() {
        std::env::remove_var("MDBFS_DEBUG");
        assert!(!debug_enabled());

        std::env::set_var("MDBFS_DEBUG", "");
        assert!(!debug_enabled());

        std::env::set_var("MDBFS_DEBUG", "1");
        assert!(debug_enabled());

        std::env::remove_var("MDBFS_DEBUG");
    }
}
