use std::{
    fmt,
    io::{self, Write},
};

use nu_ansi_term::Color::{Blue, Magenta, Red, Yellow};
use tracing::{
    field::{Field, Visit},
    Event, Level, Metadata, Subscriber,
};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, MakeWriter},
    registry::LookupSpan,
};

use crate::{cli::Args, utils::Colored};

/// Pulls the `message` field out of an event, ignoring structured fields.
#[derive(Default)]
struct Message(Option<String>);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

fn level_tag(level: Level) -> Option<Colored<&'static str>> {
    match level {
        Level::INFO => None,
        Level::TRACE => Some(Colored(Magenta, "[TRACE]")),
        Level::DEBUG => Some(Colored(Blue, "[DEBUG]")),
        Level::WARN => Some(Colored(Yellow, "[WARN]")),
        Level::ERROR => Some(Colored(Red, "[ERROR]")),
    }
}

/// `info` events print as bare lines; other levels get a colored tag.
pub struct CustomFormatter;

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        if let Some(tag) = level_tag(*event.metadata().level()) {
            write!(writer, "{tag} ")?;
        }
        let mut message = Message::default();
        event.record(&mut message);
        writeln!(writer, "{}", message.0.unwrap_or_default())
    }
}

/// Collects one formatted event, then prints it while the progress bars are
/// hidden so the two never interleave.
struct SuspendingWriter {
    line: Vec<u8>,
    stderr: bool,
}

impl Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.line.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SuspendingWriter {
    fn drop(&mut self) {
        if self.line.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.line);
        let text = text.trim_end_matches('\n');
        crate::progress::suspend(|| {
            if self.stderr {
                eprintln!("{text}");
            } else {
                println!("{text}");
            }
        });
    }
}

/// Routes `info` to stdout and every other level to stderr.
struct Console;

impl<'a> MakeWriter<'a> for Console {
    type Writer = SuspendingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendingWriter {
            line: Vec::new(),
            stderr: false,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SuspendingWriter {
            line: Vec::new(),
            stderr: *meta.level() != Level::INFO,
        }
    }
}

fn filter_level(args: &Args) -> Level {
    match (args.quiet, args.verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Installs the global subscriber. `titledb` is a target prefix, so the
/// directive covers every `titledb_*` crate.
pub fn setup_logging(args: &Args) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(format!("titledb={}", filter_level(args)))
        .with_writer(Console)
        .with_target(false)
        .without_time();

    let installed = if args.json {
        tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
    } else {
        tracing::subscriber::set_global_default(builder.event_format(CustomFormatter).finish())
    };

    if installed.is_err() {
        eprintln!("tracing subscriber already installed");
    }
}
