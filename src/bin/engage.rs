//! Engage CLI - Command-line interface for Engagement Metrics
//!
//! Commands:
//! - replay: Run a recorded host signal stream and print the emitted events (batch mode)
//! - run: Process signals from stdin as they arrive (streaming mode)
//! - validate: Validate host signal schema
//! - doctor: Diagnose configuration and environment
//! - schema: Describe the input and output formats

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use engagement_metrics::signal::{HostSignal, SignalParser, SignalValidationError, SCHEMA_VERSION};
use engagement_metrics::{
    replay, EventEmitter, LogEmitter, MetricsEvent, MetricsProcessor, TrackerConfig,
    TrackerError, WriterEmitter, METRICS_VERSION, PRODUCER_NAME,
};

/// Engage - On-device view, impression and action tracking
#[derive(Parser)]
#[command(name = "engage")]
#[command(version = METRICS_VERSION)]
#[command(about = "Turn UI lifecycle signals into engagement events", long_about = None)]
struct Cli {
    /// Log tracker decisions to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded signal stream and print the emitted events (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Tracker configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Process streaming signals from stdin (streaming mode)
    Run {
        /// Tracker configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Flush output after each event
        #[arg(long, default_value = "true")]
        flush: bool,

        /// Send events to the log (stderr) instead of stdout
        #[arg(long)]
        log_events: bool,
    },

    /// Validate host signal schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a tracker configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one signal per line)
    Ndjson,
    /// JSON array of signals
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (engage.host_signal.v1)
    Input,
    /// Output schema (engage.event.v1)
    Output,
}

const OUTPUT_SCHEMA_VERSION: &str = "engage.event.v1";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), EngageCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
        } => cmd_replay(&input, &output, input_format, output_format, config.as_deref()),

        Commands::Run {
            config,
            flush,
            log_events,
        } => cmd_run(config.as_deref(), flush, log_events),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), EngageCliError> {
    let config = load_config(config)?;
    let signals = read_signals(input, &input_format)?;

    if signals.is_empty() {
        return Err(EngageCliError::NoSignals);
    }

    log::info!("replaying {} signals", signals.len());
    let events = replay(signals, config)?;
    let output_data = format_output(&events, &output_format)?;

    if is_stdio(output) {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(config: Option<&Path>, flush: bool, log_events: bool) -> Result<(), EngageCliError> {
    let config = load_config(config)?;
    let emitter: Rc<dyn EventEmitter> = if log_events {
        if !log::log_enabled!(log::Level::Info) {
            log::warn!("--log-events needs info logging; set RUST_LOG=info or pass --verbose");
        }
        Rc::new(LogEmitter)
    } else {
        Rc::new(WriterEmitter::new(io::stdout()).flushing(flush))
    };
    let mut processor = MetricsProcessor::new(config, emitter);

    let stdin = io::stdin();
    let skipped = process_stream(&mut processor, stdin.lock())?;
    if skipped > 0 {
        log::warn!("skipped {} bad signal lines", skipped);
    }

    Ok(())
}

/// Apply every line of `input`, skipping lines that fail to decode or apply.
///
/// End of input is app teardown: every live impression is ended, also when
/// reading fails. Returns the number of skipped lines.
fn process_stream<R: BufRead>(
    processor: &mut MetricsProcessor,
    input: R,
) -> Result<usize, EngageCliError> {
    let mut skipped = 0;

    for (line_num, line) in input.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                processor.shutdown();
                return Err(e.into());
            }
        };
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let result = serde_json::from_str::<HostSignal>(trimmed)
            .map_err(TrackerError::from)
            .and_then(|signal| processor.apply(signal));
        if let Err(e) = result {
            log::warn!("skipping signal on line {}: {}", line_num + 1, e);
            skipped += 1;
        }
    }

    processor.shutdown();

    Ok(skipped)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), EngageCliError> {
    let signals = read_signals(input, &input_format)?;
    let results = SignalParser::validate_signals(&signals);

    let report = ValidationReport {
        total_signals: signals.len(),
        valid_signals: signals.len() - results.len(),
        invalid_signals: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                signal: r.signal.to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total signals:   {}", report.total_signals);
        println!("Valid signals:   {}", report.valid_signals);
        println!("Invalid signals: {}", report.invalid_signals);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} (index {}): {}", err.signal, err.index, err.error);
            }
        }
    }

    if report.invalid_signals > 0 {
        Err(EngageCliError::ValidationFailed(report.invalid_signals))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), EngageCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck {
            name: "engage_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Engage version {}", METRICS_VERSION),
        },
        DoctorCheck {
            name: "schema_version".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Input schema: {}, output schema: {}",
                SCHEMA_VERSION, OUTPUT_SCHEMA_VERSION
            ),
        },
    ];

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist".to_string(),
        }),
        Some(path) => {
            let check = match fs::read_to_string(path) {
                Ok(content) => match TrackerConfig::from_json(&content) {
                    Ok(config) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (view cache {} routes, {} ids)",
                            config.view_cache_capacity,
                            if config.id_prefix.is_some() {
                                "sequential"
                            } else {
                                "uuid"
                            }
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid config: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            };
            checks.push(check);
        }
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file, using defaults".to_string(),
        }),
    }

    // Check stdin is available (for streaming mode)
    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: METRICS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Engage Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EngageCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), EngageCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One JSON object per host callback, tagged by \"signal\":");
                println!();
                println!("Route lifecycle (per observer):");
                println!("   - attach {{ observer, route_name, route_key }}");
                println!("   - focus_gained / focus_lost / detach {{ observer }}");
                println!();
                println!("Collections:");
                println!("   - collection_mount {{ collection_id, observer?, source_type? }}");
                println!("   - visible_items_changed {{ collection_id, items: [content] }}");
                println!("   - collection_unmount {{ collection_id }}");
                println!("   - item_tapped {{ collection_id, item, action_type?, action_name? }}");
                println!();
                println!("Manual logging:");
                println!("   - view {{ route_name, route_key }}");
                println!("   - impression {{ observer?, item, source_type? }}");
                println!("   - action {{ observer?, content?, action_type, action_name?, cart? }}");
                println!("   - reset");
                println!();
                println!("Content objects are read with the configured key chains");
                println!("(defaults: content_id|contentId|_id, insertion_id|insertionId, name)");
                println!("and may carry an indexPath position hint.");
                println!();
                println!("Source types: unknown, delivery, client_backend");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: {}", OUTPUT_SCHEMA_VERSION);
                println!();
                println!("One JSON object per event, tagged by \"event\":");
                println!();
                println!("- view: {{ route_name, route_key, view_id }}");
                println!("- begin_impression: {{ impression_id, content, view_id?, source_type, position? }}");
                println!("- end_impression: {{ impression_id }}");
                println!("- action: {{ action_type, action_name?, content?, view_id?, impression_id?,");
                println!("            has_superimposed_views, destination_screen_name?, cart? }}");
                println!();
                println!("The run command adds emitted_at (RFC 3339, UTC) to every event.");
            }
        }
    }

    Ok(())
}

// Helper functions

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(input: &Path) -> Result<String, EngageCliError> {
    if is_stdio(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_signals(input: &Path, input_format: &InputFormat) -> Result<Vec<HostSignal>, EngageCliError> {
    let input_data = read_input(input)?;
    let signals = match input_format {
        InputFormat::Ndjson => SignalParser::parse_ndjson(&input_data)?,
        InputFormat::Json => SignalParser::parse_array(&input_data)?,
    };
    Ok(signals)
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig, EngageCliError> {
    match path {
        Some(path) => Ok(TrackerConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(TrackerConfig::default()),
    }
}

fn format_output(events: &[MetricsEvent], format: &OutputFormat) -> Result<String, EngageCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for event in events {
                lines.push(serde_json::to_string(event)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(events)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(events)?),
    }
}

fn get_input_json_schema() -> String {
    let content = serde_json::json!({
        "type": "object",
        "description": "Content dictionary; keys are read with the configured key chains",
        "properties": {
            "content_id": { "type": ["string", "number"] },
            "insertion_id": { "type": "string" },
            "name": { "type": "string" },
            "indexPath": { "type": "array", "items": { "type": "integer", "minimum": 0 } }
        }
    });
    let source_type = serde_json::json!({
        "type": "string",
        "enum": ["unknown", "delivery", "client_backend"]
    });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Host UI lifecycle signal",
        "type": "object",
        "required": ["signal"],
        "properties": {
            "signal": {
                "type": "string",
                "enum": [
                    "attach", "focus_gained", "focus_lost", "detach",
                    "collection_mount", "visible_items_changed", "collection_unmount",
                    "item_tapped", "action", "view", "impression", "reset"
                ]
            },
            "observer": { "type": "string", "minLength": 1 },
            "route_name": { "type": "string" },
            "route_key": { "type": "string", "minLength": 1 },
            "collection_id": { "type": "string", "minLength": 1 },
            "source_type": source_type,
            "items": { "type": "array", "items": content },
            "item": content,
            "content": content,
            "action_type": { "type": "string" },
            "action_name": { "type": "string" },
            "destination_screen_name": { "type": "string" },
            "cart": { "type": "object" }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": OUTPUT_SCHEMA_VERSION,
        "description": "Engagement event",
        "type": "object",
        "required": ["event"],
        "properties": {
            "event": {
                "type": "string",
                "enum": ["view", "begin_impression", "end_impression", "action"]
            },
            "emitted_at": { "type": "string", "format": "date-time" },
            "route_name": { "type": "string" },
            "route_key": { "type": "string" },
            "view_id": { "type": "string" },
            "impression_id": { "type": "string" },
            "content": {
                "type": "object",
                "properties": {
                    "content_id": { "type": "string" },
                    "insertion_id": { "type": "string" },
                    "name": { "type": "string" }
                }
            },
            "source_type": { "type": "string" },
            "position": { "type": "array", "items": { "type": "integer" } },
            "action_type": { "type": "string" },
            "action_name": { "type": "string" },
            "has_superimposed_views": { "type": "boolean" },
            "destination_screen_name": { "type": "string" },
            "cart": { "type": "object" }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum EngageCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    Validation(SignalValidationError),
    NoSignals,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for EngageCliError {
    fn from(e: io::Error) -> Self {
        EngageCliError::Io(e)
    }
}

impl From<TrackerError> for EngageCliError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::InvalidSignal(e) => EngageCliError::Validation(e),
            other => EngageCliError::Tracker(other),
        }
    }
}

impl From<serde_json::Error> for EngageCliError {
    fn from(e: serde_json::Error) -> Self {
        EngageCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EngageCliError> for CliError {
    fn from(e: EngageCliError) -> Self {
        match e {
            EngageCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EngageCliError::Tracker(TrackerError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'engage doctor --config <file>' for details".to_string()),
            },
            EngageCliError::Tracker(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            EngageCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EngageCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'engage validate' for details".to_string()),
            },
            EngageCliError::NoSignals => CliError {
                code: "NO_SIGNALS".to_string(),
                message: "No signals found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            EngageCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} signals failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            EngageCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_signals: usize,
    valid_signals: usize,
    invalid_signals: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    signal: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use engagement_metrics::RecordingEmitter;
    use pretty_assertions::assert_eq;

    fn processor() -> (MetricsProcessor, Rc<RecordingEmitter>) {
        let emitter = Rc::new(RecordingEmitter::new());
        let config = TrackerConfig {
            id_prefix: Some("s".to_string()),
            ..Default::default()
        };
        (MetricsProcessor::new(config, emitter.clone()), emitter)
    }

    #[test]
    fn test_stream_skips_bad_lines_and_flushes() {
        let (mut processor, emitter) = processor();
        let input = r#"{"signal":"collection_mount","collection_id":"feed"}
{"signal":"visible_items_changed","collection_id":"feed","items":[{"contentId":"A"}]}
{broken
{"signal":"item_tapped","collection_id":"feed","item":42}

{"signal":"visible_items_changed","collection_id":"feed","items":[{"contentId":"A"},{"contentId":"B"}]}
"#;

        let skipped = process_stream(&mut processor, input.as_bytes()).unwrap();

        assert_eq!(skipped, 2);
        assert_eq!(emitter.count("begin_impression"), 2);
        assert_eq!(emitter.count("end_impression"), 2);
        assert_eq!(processor.impressions().mounted_count(), 0);
    }

    #[test]
    fn test_stream_flushes_on_read_error() {
        struct FailingReader {
            served: bool,
        }

        impl Read for FailingReader {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.served {
                    return Err(io::Error::new(io::ErrorKind::Other, "stdin closed"));
                }
                self.served = true;
                let data = b"{\"signal\":\"collection_mount\",\"collection_id\":\"feed\"}\n\
                    {\"signal\":\"visible_items_changed\",\"collection_id\":\"feed\",\"items\":[{\"contentId\":\"A\"}]}\n";
                buf[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
        }

        let (mut processor, emitter) = processor();
        let reader = io::BufReader::new(FailingReader { served: false });

        let result = process_stream(&mut processor, reader);

        assert!(matches!(result, Err(EngageCliError::Io(_))));
        assert_eq!(emitter.count("begin_impression"), 1);
        assert_eq!(emitter.count("end_impression"), 1);
    }
}
