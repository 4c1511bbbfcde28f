//! Entry point for the audoc CLI.

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, Read};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use audoc::adapters::output::file::FileOutput;
use audoc::adapters::output::syslog::{facility_from_str, severity_from_str, SyslogOutput};
use audoc::adapters::parser::FeedParser;
use audoc::core::convert::Converter;
use audoc::core::format::{EventsPerDoc, Format, Lang};
use audoc::ports::output::OutputSink;

/// Convert audit log to JSON or XML.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Input file path, or "-" for stdin.
    #[arg(default_value = "-")]
    input: String,

    /// Output version information and exit.
    #[arg(
        short = 'v',
        long = "version",
        action = clap::ArgAction::Version,
        value_parser = clap::value_parser!(bool)
    )]
    version: Option<bool>,

    /// Output language.
    #[arg(short, long, value_enum, default_value_t = Lang::Json)]
    lang: Lang,

    /// Events per document: "none", a count, a negated byte bound, or "all".
    #[arg(long, default_value = "all", value_parser = parse_events_per_doc)]
    events_per_doc: EventsPerDoc,

    /// Nesting level folded into a single line: "all", a level, or "none".
    #[arg(long, default_value = "5", value_parser = parse_fold)]
    fold: usize,

    /// Spaces of indentation per nesting level.
    #[arg(long, default_value_t = 4)]
    indent: usize,

    /// Include original raw log messages in the output.
    #[arg(long, default_value_t = false)]
    with_raw: bool,

    /// Hard per-event byte budget; oversized events are trimmed to fit.
    #[arg(long)]
    max_event_size: Option<usize>,

    /// Output type.
    #[arg(short, long, value_enum, default_value_t = OutputType::File)]
    output: OutputType,

    /// Output file path with file output, or "-" for stdout.
    #[arg(short, long, default_value = "-")]
    file: String,

    /// Syslog facility name with syslog output.
    #[arg(long, default_value = "authpriv")]
    syslog_facility: String,

    /// Syslog priority name with syslog output.
    #[arg(long, default_value = "info")]
    syslog_priority: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputType {
    File,
    Syslog,
}

fn parse_events_per_doc(s: &str) -> Result<EventsPerDoc, String> {
    match s {
        "all" => Ok(EventsPerDoc::All),
        "none" => Ok(EventsPerDoc::None),
        _ => {
            let n: i64 = s
                .parse()
                .map_err(|_| format!("expected \"none\", \"all\" or a number, got {s:?}"))?;
            Ok(match n {
                0 => EventsPerDoc::None,
                n if n > 0 => EventsPerDoc::Count(n as usize),
                n => EventsPerDoc::Bytes(n.unsigned_abs() as usize),
            })
        }
    }
}

fn parse_fold(s: &str) -> Result<usize, String> {
    match s {
        "all" => Ok(0),
        "none" => Ok(usize::MAX),
        _ => s
            .parse()
            .map_err(|_| format!("expected \"all\", \"none\" or a level, got {s:?}")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let format = Format {
        lang: cli.lang,
        fold_level: cli.fold,
        init_indent: 0,
        nest_indent: cli.indent,
        events_per_doc: cli.events_per_doc,
        with_text: cli.with_raw,
        max_event_size: cli.max_event_size.unwrap_or(usize::MAX),
    };
    if !format.is_valid() {
        return Err(anyhow!(
            "event size budget must be at least {} bytes",
            Format::MIN_MAX_EVENT_SIZE
        ));
    }

    let mut input: Box<dyn Read> = if cli.input == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(
            File::open(&cli.input)
                .with_context(|| format!("Failed opening input file {:?}", cli.input))?,
        )
    };

    let output = create_output(&cli)?;
    if !output.is_continuous() && cli.events_per_doc != EventsPerDoc::None {
        warn!("discrete output with a document mode that spans several writes");
    }

    info!("Converting {:?}...", cli.input);
    let mut conv = Converter::new(format, FeedParser::new(), output)
        .context("Failed creating converter")?;
    conv.begin().context("Failed starting document")?;

    let mut buf = [0u8; 4096];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed reading input"),
        };
        conv.input(&buf[..n]).context("Failed feeding the converter")?;
    }

    conv.flush().context("Failed flushing the converter")?;
    conv.end().context("Failed finishing document")?;
    info!("Done.");

    Ok(())
}

fn create_output(cli: &Cli) -> anyhow::Result<Box<dyn OutputSink>> {
    match cli.output {
        OutputType::File => {
            if cli.file == "-" {
                Ok(Box::new(FileOutput::stdout()))
            } else {
                Ok(Box::new(FileOutput::create(&cli.file).with_context(
                    || format!("Failed opening output file {:?}", cli.file),
                )?))
            }
        }
        OutputType::Syslog => {
            let facility = facility_from_str(&cli.syslog_facility)
                .ok_or_else(|| anyhow!("Unknown syslog facility {:?}", cli.syslog_facility))?;
            let severity = severity_from_str(&cli.syslog_priority)
                .ok_or_else(|| anyhow!("Unknown syslog priority {:?}", cli.syslog_priority))?;
            Ok(Box::new(
                SyslogOutput::open(facility, severity).context("Failed opening syslog")?,
            ))
        }
    }
}

fn init_logging() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}
