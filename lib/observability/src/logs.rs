use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the process logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
    Logfmt,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log format `{0}`, expected one of: plain, json, logfmt")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            "logfmt" => Ok(Self::Logfmt),
            _ => Err(UnknownLogFormat(s.to_owned())),
        }
    }
}

/// Builder of the global `tracing` subscriber.
#[derive(Debug)]
pub struct Logs {
    format: LogFormat,
    default_directives: String,
    use_color: bool,
}

impl Default for Logs {
    fn default() -> Self {
        Self {
            format: LogFormat::Plain,
            default_directives: "info".to_owned(),
            use_color: true,
        }
    }
}

impl Logs {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Filter directives used when `RUST_LOG` is not set.
    pub fn with_default_directives(mut self, directives: impl Into<String>) -> Self {
        self.default_directives = directives.into();
        self
    }

    pub fn disable_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directives))
    }

    /// Installs the subscriber globally. Fails if one is already installed.
    pub fn install(self) -> anyhow::Result<()> {
        let filter = self.env_filter();
        let layer = match self.format {
            LogFormat::Plain => tracing_subscriber::fmt::layer()
                .with_ansi(self.use_color)
                .boxed(),
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .boxed(),
            LogFormat::Logfmt => tracing_logfmt::layer().boxed(),
        };
        tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()?;
        Ok(())
    }
}
