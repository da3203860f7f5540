/// Format of the agent's logs, which are always written to stderr.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines, for local development.
    Text,
    /// One JSON object per line, for log collectors.
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub struct LogArgs {
    /// Log filter, as a level (`info`) or a list of directives (`info,notify_agent=debug`).
    #[clap(long = "log.level", env = "LOG_LEVEL", default_value = "info")]
    pub level: String,
    #[clap(long = "log.format", env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub format: LogFormat,
}

/// Installs the global tracing subscriber.
pub fn init_logging(args: &LogArgs) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(&args.level)
        .map_err(|err| anyhow::anyhow!("invalid log level '{}': {err}", args.level))?;

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339());

    let result = match args.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder
            .json()
            // Otherwise the message and fields are nested under a `"fields"` object.
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
    };
    result.map_err(|err| anyhow::anyhow!("setting tracing default failed: {err}"))
}
