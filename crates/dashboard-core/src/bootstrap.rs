use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use tracing::{debug, info};

use crate::config::{Config, expand_tilde};
use crate::snapshot::BootstrapData;

const BUILTIN_WIDGETS: &str = include_str!("../data/widgets.json");

/// Where the first layout comes from when storage has no snapshot yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    Builtin,
    File(PathBuf),
    Url { url: String, timeout: Duration },
}

impl Bootstrap {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let source = cfg.get("bootstrap").unwrap_or_else(|| "builtin".to_string());
        let source = source.trim();

        if source.is_empty() || source.eq_ignore_ascii_case("builtin") {
            return Ok(Self::Builtin);
        }

        if source.starts_with("http://") || source.starts_with("https://") {
            let secs = cfg.get_u64("bootstrap.timeout")?.unwrap_or(10);
            return Ok(Self::Url {
                url: source.to_string(),
                timeout: Duration::from_secs(secs),
            });
        }

        Ok(Self::File(expand_tilde(Path::new(source))))
    }

    #[tracing::instrument(skip(self))]
    pub fn fetch(&self) -> anyhow::Result<BootstrapData> {
        let raw = match self {
            Self::Builtin => {
                debug!("using builtin widget set");
                BUILTIN_WIDGETS.to_string()
            }
            Self::File(path) => {
                info!(file = %path.display(), "reading bootstrap file");
                fs::read_to_string(path)
                    .with_context(|| format!("failed reading {}", path.display()))?
            }
            Self::Url { url, timeout } => {
                info!(url = %url, timeout_secs = timeout.as_secs(), "fetching bootstrap resource");
                fetch_url(url, *timeout)?
            }
        };

        let data: BootstrapData =
            serde_json::from_str(&raw).context("failed parsing bootstrap widgets")?;
        debug!(
            categories = data.categories.len(),
            widgets = data.widgets.len(),
            "parsed bootstrap data"
        );
        Ok(data)
    }
}

fn fetch_url(url: &str, timeout: Duration) -> anyhow::Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build http client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("request to {url} failed"))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("{url} returned {status}"));
    }
    response
        .text()
        .with_context(|| format!("failed reading body of {url}"))
}
