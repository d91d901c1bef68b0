//! Output layer per [`Format`]

use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::registry::LookupSpan;

use crate::config::{DisplayConfig, Format};

pub(super) type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Fmt layer for `format` writing to `writer`.
pub(super) fn output_layer<S>(
    format: Format,
    display: &DisplayConfig,
    writer: BoxMakeWriter,
) -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let base = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(display.target)
        .with_file(display.source)
        .with_line_number(display.source)
        .with_thread_ids(display.thread_ids)
        .with_thread_names(display.thread_names);

    match format {
        Format::Pretty => base.pretty().with_ansi(display.colors).boxed(),
        Format::Compact => base.compact().with_ansi(display.colors).boxed(),
        // log collectors get plain JSON lines
        Format::Json => base
            .json()
            .with_ansi(false)
            .with_current_span(true)
            .with_span_list(display.span_list)
            .flatten_event(display.flatten)
            .boxed(),
    }
}
