// stderr subscriber installed by --verbose.
//
// Engine diagnostics go through the `log` facade; tracing-subscriber's
// log bridge turns them into events, so validation progress streams live
// instead of being rendered as a tree at the end.

use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::render::prefix;

fn label(level: &Level) -> &'static str {
    if *level == Level::ERROR {
        "ERROR"
    } else if *level == Level::WARN {
        "WARNING"
    } else if *level == Level::INFO {
        "INFO"
    } else if *level == Level::DEBUG {
        "DEBUG"
    } else {
        "TRACE"
    }
}

/// `[hips/LEVEL   ] message`, the same prefix the diagnostic tree uses.
pub struct HipsFormat;

impl<S, N> FormatEvent<S, N> for HipsFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        write!(writer, "{} ", prefix(label(event.metadata().level())))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the subscriber. Shows debug and up unless `RUST_LOG` says otherwise.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(HipsFormat)
        .try_init();
}
