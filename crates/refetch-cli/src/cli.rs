use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use refetch::{ClientSetting, LocalOptions};
use reqwest::Url;
use tracing::level_filters::LevelFilter;

#[derive(Clone, Debug, Parser)]
#[command(name = "refetch", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
pub struct App {
    /// URL of the resource, absolute or relative to --base-url.
    pub url: String,

    /// Local file to keep in sync with the URL.
    pub dest: PathBuf,

    /// Base URL that relative URLs are resolved against.
    #[arg(long)]
    pub base_url: Option<Url>,

    /// Extra request header, as "Name: value". Repeatable.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Total timeout of each request in seconds.
    #[arg(long, value_parser = parse_secs)]
    pub timeout: Option<Duration>,

    /// Connect timeout in seconds.
    #[arg(long, value_parser = parse_secs)]
    pub connect_timeout: Option<Duration>,

    /// Proxy URL. http and https proxies may both be given.
    #[arg(long)]
    pub proxy: Vec<Url>,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Attempts after the first one for retryable failures.
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Delay before the first retry; doubles on every further retry.
    #[arg(long, default_value_t = 500)]
    pub retry_backoff_ms: u64,

    /// Give up after this many seconds, keeping the partial download.
    #[arg(long, value_parser = parse_secs)]
    pub deadline: Option<Duration>,

    /// Fsync the downloaded file before it replaces the destination.
    #[arg(long)]
    pub sync: bool,

    /// Drop any leftover partial download and start over.
    #[arg(long)]
    pub restart: bool,

    /// More logging; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors and print nothing on success.
    #[arg(short, long)]
    pub quiet: bool,
}

impl App {
    pub fn resolve_url(&self) -> Result<Url> {
        match &self.base_url {
            Some(base) => base
                .join(&self.url)
                .with_context(|| format!("cannot resolve {} against {base}", self.url)),
            None => Url::parse(&self.url).with_context(|| format!("invalid URL {}", self.url)),
        }
    }

    pub fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    pub fn retry_backoff(&self) -> Duration { Duration::from_millis(self.retry_backoff_ms) }

    pub fn client_setting(&self) -> ClientSetting {
        let mut setting = ClientSetting::default();
        if let Some(timeout) = self.timeout {
            setting = setting.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            setting = setting.connect_timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            setting = setting.user_agent(user_agent.clone());
        }
        for proxy in &self.proxy {
            setting = setting.proxy(proxy.clone());
        }
        for (name, value) in &self.headers {
            setting = setting.header(name.clone(), value.clone());
        }
        setting
    }

    pub fn local_options(&self) -> LocalOptions { LocalOptions::new().sync(self.sync) }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {s:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("not a number of seconds: {s:?}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}
