use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flagbridge_core::{
    normalize, AliasTable, Attributes, CanonicalKey, Membership, OccurrenceRecord, RecordShape,
    SubjectRecord,
};
use flagbridge_provider::{
    LocalSettings, NdjsonEventSink, Provider, ProviderConfig, ProviderSettings, RemoteSettings,
    TrackingDetails, DEFAULT_TIMEOUT_MS,
};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const LOCAL_DEPLOYMENT_KEY: &str = "local";

#[derive(Debug, Parser)]
#[command(name = "fb")]
#[command(about = "Feature flag evaluation adapter CLI")]
struct Cli {
    /// YAML provider settings; overrides the snapshot and remote flags.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON variant snapshot served in local mode.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[arg(long, global = true)]
    remote_url: Option<String>,

    #[arg(long, global = true)]
    deployment_key: Option<String>,

    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Aliases(AliasesArgs),
    Normalize(NormalizeArgs),
    Evaluate(EvaluateArgs),
    Track(TrackArgs),
}

#[derive(Debug, Args)]
struct AliasesArgs {
    #[arg(long)]
    key: Option<String>,
}

#[derive(Debug, Args)]
struct NormalizeArgs {
    #[arg(long)]
    context: String,
    #[arg(long, value_enum, default_value_t = ShapeArg::Subject)]
    shape: ShapeArg,
}

#[derive(Debug, Args)]
struct EvaluateArgs {
    #[arg(long)]
    flag: String,
    #[arg(long = "type", value_enum)]
    flag_type: FlagTypeArg,
    #[arg(long)]
    default: String,
    #[arg(long, default_value = "{}")]
    context: String,
}

#[derive(Debug, Args)]
struct TrackArgs {
    #[arg(long)]
    event: String,
    #[arg(long, default_value = "{}")]
    context: String,
    #[arg(long, default_value_t = 0.0)]
    value: f64,
    #[arg(long)]
    attributes: Option<String>,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeArg {
    Subject,
    Occurrence,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FlagTypeArg {
    Bool,
    String,
    Int,
    Float,
    Object,
}

impl FlagTypeArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Object => "object",
        }
    }
}

fn shape_from_arg(value: ShapeArg) -> RecordShape {
    match value {
        ShapeArg::Subject => RecordShape::Subject,
        ShapeArg::Occurrence => RecordShape::Occurrence,
    }
}

fn membership_as_str(value: Membership) -> &'static str {
    match value {
        Membership::SubjectOnly => "subject_only",
        Membership::OccurrenceOnly => "occurrence_only",
        Membership::Shared => "shared",
    }
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match &cli.command {
        Command::Aliases(args) => run_aliases(args),
        Command::Normalize(args) => run_normalize(args),
        Command::Evaluate(args) => run_evaluate(&cli, args),
        Command::Track(args) => run_track(&cli, args),
    }
}

fn parse_attributes(raw: &str, what: &str) -> Result<Attributes> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("{what} must be valid JSON"))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("{what} must be a JSON object, got {other}")),
    }
}

fn load_settings(cli: &Cli) -> Result<ProviderSettings> {
    if let Some(path) = cli.config.as_ref() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        return serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()));
    }

    let deployment_key = cli.deployment_key.clone().unwrap_or_else(|| {
        if cli.remote_url.is_some() {
            String::new()
        } else {
            LOCAL_DEPLOYMENT_KEY.to_string()
        }
    });
    let mut settings = ProviderSettings::new(deployment_key);
    if let Some(snapshot_path) = cli.snapshot.clone() {
        settings = settings.with_local(LocalSettings { snapshot_path: Some(snapshot_path) });
    }
    if let Some(server_url) = cli.remote_url.clone() {
        settings = settings.with_remote(RemoteSettings { server_url, timeout_ms: cli.timeout_ms });
    }
    Ok(settings)
}

fn start_provider(config: ProviderConfig) -> Result<Provider> {
    let provider = Provider::new(config).context("invalid provider configuration")?;
    provider.init().context("failed to start provider")?;
    debug!(state = provider.state().as_str(), "provider started");
    Ok(provider)
}

fn run_aliases(args: &AliasesArgs) -> Result<()> {
    let table = AliasTable::builtin();
    let describe = |key: CanonicalKey| {
        serde_json::json!({
            "key": key.name(),
            "membership": membership_as_str(key.membership()),
            "aliases": table.aliases_for(key),
        })
    };

    match args.key.as_deref() {
        Some(name) => {
            let key = CanonicalKey::parse(name)
                .ok_or_else(|| anyhow!("unknown canonical key: {name}"))?;
            emit_json(describe(key))
        }
        None => emit_json(serde_json::json!({
            "alias_count": table.len(),
            "keys": CanonicalKey::ALL.into_iter().map(describe).collect::<Vec<_>>(),
        })),
    }
}

fn run_normalize(args: &NormalizeArgs) -> Result<()> {
    let attributes = parse_attributes(&args.context, "--context")?;
    let shape = shape_from_arg(args.shape);
    let normalized = normalize(&attributes, &AliasTable::builtin(), shape);

    let projection = match shape {
        RecordShape::Subject => SubjectRecord::project(&normalized)
            .map(serde_json::to_value)
            .map_err(|err| err.to_string()),
        RecordShape::Occurrence => OccurrenceRecord::project(&normalized)
            .map(serde_json::to_value)
            .map_err(|err| err.to_string()),
    };
    let (record, projection_error) = match projection {
        Ok(encoded) => (Some(encoded?), None),
        Err(err) => (None, Some(err)),
    };

    emit_json(serde_json::json!({
        "shape": shape.as_str(),
        "canonical": normalized.canonical,
        "overflow": normalized.overflow,
        "has_identity": normalized.has_identity(),
        "record": record,
        "projection_error": projection_error,
    }))
}

fn run_evaluate(cli: &Cli, args: &EvaluateArgs) -> Result<()> {
    let context = parse_attributes(&args.context, "--context")?;
    let default = parse_default(&args.default);
    let provider = start_provider(ProviderConfig::new(load_settings(cli)?))?;

    let detail = match args.flag_type {
        FlagTypeArg::Bool => {
            let default = default
                .as_bool()
                .ok_or_else(|| anyhow!("--default must be true or false for bool flags"))?;
            serde_json::to_value(provider.evaluate_boolean(&args.flag, default, &context))?
        }
        FlagTypeArg::String => {
            let default = match default {
                Value::String(text) => text,
                other => other.to_string(),
            };
            serde_json::to_value(provider.evaluate_string(&args.flag, default, &context))?
        }
        FlagTypeArg::Int => {
            let default = default
                .as_i64()
                .ok_or_else(|| anyhow!("--default must be an integer for int flags"))?;
            serde_json::to_value(provider.evaluate_integer(&args.flag, default, &context))?
        }
        FlagTypeArg::Float => {
            let default = default
                .as_f64()
                .ok_or_else(|| anyhow!("--default must be a number for float flags"))?;
            serde_json::to_value(provider.evaluate_float(&args.flag, default, &context))?
        }
        FlagTypeArg::Object => {
            serde_json::to_value(provider.evaluate_object(&args.flag, default, &context))?
        }
    };

    let mut output = match detail {
        Value::Object(map) => map,
        other => bail!("evaluation detail should encode as an object, got {other}"),
    };
    output.insert("flag".to_string(), Value::String(args.flag.clone()));
    output.insert("type".to_string(), Value::String(args.flag_type.as_str().to_string()));
    emit_json(Value::Object(output))
}

/// Defaults are JSON; anything that does not parse is taken as a plain string.
fn parse_default(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn run_track(cli: &Cli, args: &TrackArgs) -> Result<()> {
    let context = parse_attributes(&args.context, "--context")?;
    let attributes = match args.attributes.as_deref() {
        Some(raw) => parse_attributes(raw, "--attributes")?,
        None => Attributes::new(),
    };
    let details = TrackingDetails { value: args.value, attributes };

    let config = ProviderConfig::new(load_settings(cli)?)
        .with_event_sink(Arc::new(NdjsonEventSink::new(&args.out)));
    let provider = Provider::new(config).context("invalid provider configuration")?;
    provider
        .track(&args.event, &context, &details)
        .with_context(|| format!("failed to track event {}", args.event))?;

    emit_json(serde_json::json!({
        "event": args.event,
        "out": args.out.display().to_string(),
        "tracked": true,
    }))
}
