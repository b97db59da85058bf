/// MessageStream command-line tool: inspect, validate, encode, and decode
/// message files.
///
/// # Command overview
///
/// ```text
/// msgstream <COMMAND> [OPTIONS]
///
/// Commands:
///   inspect    Print the object tree of every message in a file
///   validate   Check every message in a file for protocol errors
///   encode     Create a message from a JSON document
///   decode     Render messages as JSON
///   codes      Print the control-code table
///   help       Print help information
///
/// Global options:
///   -v, --verbose    Log decoder and encoder activity (debug level)
///   -h, --help       Print help
///   -V, --version    Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                 |
/// |------|-----------------------------------------|
/// | 0    | Success                                 |
/// | 1    | Error (I/O failure, invalid file, etc.) |
///
/// All error details are written to stderr so stdout can be piped cleanly.
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use msgstream_decoder::DecoderConfig;

mod cmd_codes;
mod cmd_decode;
mod cmd_encode;
mod cmd_inspect;
mod cmd_validate;
mod json;

// ── CLI root ──────────────────────────────────────────────────────────────────

/// The MessageStream command-line tool.
#[derive(Parser)]
#[command(name = "msgstream", version, about = "MessageStream binary serialization CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log decoder and encoder activity at debug level.
    ///
    /// `RUST_LOG` still takes precedence when set.
    #[arg(short, long, global = true)]
    verbose: bool,
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// Print the object tree of every message in a file.
    Inspect(InspectArgs),
    /// Check every message in a file for protocol errors.
    Validate(ValidateArgs),
    /// Create a message from a JSON document.
    Encode(EncodeArgs),
    /// Render messages as JSON.
    Decode(DecodeArgs),
    /// Print the control-code table as markdown.
    Codes,
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Decoder limits shared by every command that reads messages.
///
/// ```text
/// ┌────────────────────┬──────────────────────────────────────────────┐
/// │ Flag               │ Effect                                       │
/// ├────────────────────┼──────────────────────────────────────────────┤
/// │ --max-depth N      │ Deepest container nesting accepted (256)     │
/// │ --max-len N        │ Largest declared container length (16 Mi)    │
/// │ --strict-varints   │ Reject varints wider than their minimal form │
/// └────────────────────┴──────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct LimitArgs {
    /// Deepest container nesting accepted.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Largest declared list, tuple, map, or bytes length accepted.
    #[arg(long)]
    pub max_len: Option<usize>,

    /// Reject varints encoded wider than necessary.
    #[arg(long)]
    pub strict_varints: bool,
}

impl LimitArgs {
    pub fn config(&self) -> DecoderConfig {
        let defaults = DecoderConfig::default();
        DecoderConfig {
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            max_container_len: self.max_len.unwrap_or(defaults.max_container_len),
            strict_varints: self.strict_varints,
            ..defaults
        }
    }
}

/// Arguments for `msgstream inspect`.
///
/// Decodes each message in the file and prints its byte range, the custom
/// types it instantiates, and its object tree. Objects reached more than
/// once are expanded at their first occurrence and shown as `→ #n`
/// afterwards.
#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the message file to inspect.
    pub file: PathBuf,

    /// Inspect only the message at this zero-based index.
    #[arg(long)]
    pub message: Option<usize>,

    /// Also print a hex dump of each message's bytes (16 per line).
    #[arg(long)]
    pub show_hex: bool,

    #[command(flatten)]
    pub limits: LimitArgs,
}

/// Arguments for `msgstream validate`.
///
/// Decodes every message in the file and reports either a success summary
/// or the first protocol error. The process exits with code 0 on success
/// and code 1 on any error.
#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Path to the message file to validate.
    pub file: PathBuf,

    #[command(flatten)]
    pub limits: LimitArgs,
}

/// Arguments for `msgstream encode`.
///
/// Reads a JSON document (see the `json` module for the tagged forms used
/// for tuples, maps, decimals, shared nodes, and so on) and writes it as
/// one message.
///
/// ```text
/// ┌────────────────┬─────────────────────────────────────────────────┐
/// │ Flag           │ Effect                                          │
/// ├────────────────┼─────────────────────────────────────────────────┤
/// │ -o / --output  │ Output file path (required)                     │
/// │ --anchorless   │ Number every object instead of anchoring shared │
/// │ --append       │ Append to the output instead of truncating it   │
/// └────────────────┴─────────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct EncodeArgs {
    /// Path to the JSON document, or `-` for stdin.
    pub input: PathBuf,

    /// Output message file path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Emit ANCHORLESS_ON and let every object take an automatic id.
    #[arg(long)]
    pub anchorless: bool,

    /// Append the message to an existing file of messages.
    #[arg(long)]
    pub append: bool,
}

/// Arguments for `msgstream decode`.
///
/// Decodes each message and prints it as one JSON document per line, or
/// pretty-printed with `--pretty`. With `-` as the file, messages are
/// read incrementally from stdin.
#[derive(clap::Args)]
pub struct DecodeArgs {
    /// Path to the message file, or `-` for stdin.
    pub file: PathBuf,

    /// Pretty-print each JSON document.
    #[arg(long)]
    pub pretty: bool,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub limits: LimitArgs,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let result = match cli.command {
        Commands::Inspect(args) => cmd_inspect::run(&args),
        Commands::Validate(args) => cmd_validate::run(&args),
        Commands::Encode(args) => cmd_encode::run(&args),
        Commands::Decode(args) => cmd_decode::run(&args),
        Commands::Codes => cmd_codes::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
