use clap::{Arg, ArgMatches, Command, ValueEnum};
use serde_json::Value;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use taskmcp::tool_api::{
    ActiveChangesQuery, ChangeOptions, ClientConfig, Transport, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY,
};

const BASE_URL_ENV: &str = "TASK_MCP_BASE_URL";
const TOKEN_ENV: &str = "TASK_MCP_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    None,
}

impl LogLevel {
    /// Whether the client should emit its own info-level lifecycle logs.
    pub fn client_logging(self) -> bool {
        matches!(self, Self::Debug | Self::Info)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Sse,
    Ndjson,
}

impl From<TransportArg> for Transport {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Sse => Transport::Sse,
            TransportArg::Ndjson => Transport::Ndjson,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Health,
    Metrics,
    Call { tool: String, input: Value },
    CreateChange {
        title: String,
        slug: String,
        options: ChangeOptions,
    },
    ArchiveChange { slug: String },
    ActiveChanges(ActiveChangesQuery),
    Batch { file: PathBuf },
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub client: ClientConfig,
    pub transport: Transport,
    pub log_level: LogLevel,
    pub action: Action,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingBaseUrl,
    InvalidArg(String),
    Clap(clap::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingBaseUrl => {
                write!(f, "A server address is required: pass --base-url or set {BASE_URL_ENV}")
            }
            ConfigError::InvalidArg(msg) => write!(f, "{msg}"),
            ConfigError::Clap(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn parse_cli_command() -> Result<CliConfig, ConfigError> {
    let raw_args: Vec<String> = env::args().collect();
    parse_cli_command_from(raw_args)
}

fn parse_cli_command_from(raw_args: Vec<String>) -> Result<CliConfig, ConfigError> {
    let matches = build_cli()
        .try_get_matches_from(raw_args)
        .map_err(ConfigError::Clap)?;

    let base_url = matches
        .get_one::<String>("baseUrl")
        .cloned()
        .or_else(|| env::var(BASE_URL_ENV).ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingBaseUrl)?;
    let auth_token = matches
        .get_one::<String>("token")
        .cloned()
        .or_else(|| env::var(TOKEN_ENV).ok())
        .unwrap_or_default();

    let log_level = matches
        .get_one::<LogLevel>("logLevel")
        .copied()
        .unwrap_or(LogLevel::Warn);
    let transport = matches
        .get_one::<TransportArg>("transport")
        .copied()
        .map(Transport::from)
        .unwrap_or_default();

    let mut client = ClientConfig::new(base_url, auth_token);
    client.timeout = parse_seconds(&matches, "timeout")?.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    client.connect_timeout =
        parse_seconds(&matches, "connectTimeout")?.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
    client.retry_delay = parse_seconds(&matches, "retryDelay")?.unwrap_or(DEFAULT_RETRY_DELAY);
    client.retry_attempts = matches
        .get_one::<u32>("retryAttempts")
        .copied()
        .unwrap_or(DEFAULT_RETRY_ATTEMPTS);
    if client.retry_attempts == 0 {
        return Err(ConfigError::InvalidArg(
            "--retry-attempts must be at least 1".to_string(),
        ));
    }
    client.enable_logging = log_level.client_logging();

    let action = parse_action(&matches)?;

    Ok(CliConfig {
        client,
        transport,
        log_level,
        action,
    })
}

fn parse_action(matches: &ArgMatches) -> Result<Action, ConfigError> {
    let Some((name, sub)) = matches.subcommand() else {
        return Err(ConfigError::InvalidArg("A subcommand is required".to_string()));
    };

    match name {
        "health" => Ok(Action::Health),
        "metrics" => Ok(Action::Metrics),
        "call" => {
            let tool = required_arg(sub, "tool")?.to_string();
            let input = match sub.get_one::<String>("input") {
                Some(raw) => serde_json::from_str::<Value>(raw).map_err(|err| {
                    ConfigError::InvalidArg(format!("--input must be valid JSON: {err}"))
                })?,
                None => Value::Object(Default::default()),
            };
            Ok(Action::Call { tool, input })
        }
        "create-change" => Ok(Action::CreateChange {
            title: required_arg(sub, "title")?.to_string(),
            slug: required_arg(sub, "slug")?.to_string(),
            options: ChangeOptions {
                template: sub.get_one::<String>("template").cloned(),
                rationale: sub.get_one::<String>("rationale").cloned(),
                owner: sub.get_one::<String>("owner").cloned(),
                ttl: sub.get_one::<u64>("ttl").copied(),
            },
        }),
        "archive-change" => Ok(Action::ArchiveChange {
            slug: required_arg(sub, "slug")?.to_string(),
        }),
        "active-changes" => {
            let defaults = ActiveChangesQuery::default();
            Ok(Action::ActiveChanges(ActiveChangesQuery {
                limit: sub.get_one::<u32>("limit").copied().unwrap_or(defaults.limit),
                offset: sub
                    .get_one::<u32>("offset")
                    .copied()
                    .unwrap_or(defaults.offset),
            }))
        }
        "batch" => Ok(Action::Batch {
            file: PathBuf::from(required_arg(sub, "file")?),
        }),
        other => Err(ConfigError::InvalidArg(format!(
            "Unknown subcommand '{other}'"
        ))),
    }
}

fn build_cli() -> Command {
    Command::new("taskmcp")
        .about("Execute tools on a Task MCP server over SSE or NDJSON")
        .subcommand_required(true)
        .arg(
            Arg::new("baseUrl")
                .long("base-url")
                .value_name("URL")
                .global(true),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .value_name("TOKEN")
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .value_parser(clap::value_parser!(f64))
                .global(true),
        )
        .arg(
            Arg::new("connectTimeout")
                .long("connect-timeout")
                .value_name("SECS")
                .value_parser(clap::value_parser!(f64))
                .global(true),
        )
        .arg(
            Arg::new("retryAttempts")
                .long("retry-attempts")
                .value_name("N")
                .value_parser(clap::value_parser!(u32))
                .global(true),
        )
        .arg(
            Arg::new("retryDelay")
                .long("retry-delay")
                .value_name("SECS")
                .value_parser(clap::value_parser!(f64))
                .global(true),
        )
        .arg(
            Arg::new("transport")
                .long("transport")
                .value_parser(clap::builder::EnumValueParser::<TransportArg>::new())
                .value_name("sse|ndjson")
                .global(true),
        )
        .arg(
            Arg::new("logLevel")
                .long("log-level")
                .value_parser(clap::builder::EnumValueParser::<LogLevel>::new())
                .value_name("debug|info|warn|none")
                .global(true),
        )
        .subcommand(Command::new("health").about("Check server health"))
        .subcommand(Command::new("metrics").about("Fetch security metrics (requires token)"))
        .subcommand(
            Command::new("call")
                .about("Execute a tool with a JSON input")
                .arg(Arg::new("tool").required(true).value_name("TOOL"))
                .arg(Arg::new("input").long("input").value_name("JSON")),
        )
        .subcommand(
            Command::new("create-change")
                .about("Open a new change")
                .arg(Arg::new("title").long("title").required(true))
                .arg(Arg::new("slug").long("slug").required(true))
                .arg(Arg::new("template").long("template"))
                .arg(Arg::new("rationale").long("rationale"))
                .arg(Arg::new("owner").long("owner"))
                .arg(
                    Arg::new("ttl")
                        .long("ttl")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("archive-change")
                .about("Archive a change")
                .arg(Arg::new("slug").required(true).value_name("SLUG")),
        )
        .subcommand(
            Command::new("active-changes")
                .about("List active changes")
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("offset")
                        .long("offset")
                        .value_parser(clap::value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("batch")
                .about("Run a JSON array of {tool, input} operations concurrently")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_name("PATH"),
                ),
        )
}

fn required_arg<'a>(matches: &'a ArgMatches, key: &str) -> Result<&'a str, ConfigError> {
    matches
        .get_one::<String>(key)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::InvalidArg(format!("Missing required arg --{key}")))
}

fn parse_seconds(matches: &ArgMatches, key: &str) -> Result<Option<Duration>, ConfigError> {
    let Some(secs) = matches.get_one::<f64>(key).copied() else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|err| ConfigError::InvalidArg(format!("Invalid value for --{key}: {err}")))
}
