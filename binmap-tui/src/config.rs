use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use binmap_core::model::{MemberId, Position, Viewer};

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_LOG_FILE: &str = "binmap.log";

/// Runtime settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub api_url: String,
    pub fix_file: Option<PathBuf>,
    pub position: Option<Position>,
    pub radius_m: Option<f64>,
    pub member_id: Option<MemberId>,
    pub log_file: PathBuf,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_owned())
                .filter(|raw| !raw.is_empty())
        };

        let position = value("BINMAP_POSITION")
            .map(|raw| {
                raw.parse::<Position>()
                    .with_context(|| format!("BINMAP_POSITION={raw:?} is not \"<lat>,<lng>\""))
            })
            .transpose()?;

        let radius_m = value("BINMAP_RADIUS_M")
            .map(|raw| parse_radius(&raw))
            .transpose()?;

        let member_id = value("BINMAP_MEMBER_ID")
            .map(|raw| {
                raw.parse::<u64>()
                    .map(MemberId)
                    .with_context(|| format!("BINMAP_MEMBER_ID={raw:?} is not a member id"))
            })
            .transpose()?;

        Ok(Self {
            api_url: value("BINMAP_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            fix_file: value("BINMAP_FIX_FILE").map(PathBuf::from),
            position,
            radius_m,
            member_id,
            log_file: value("BINMAP_LOG_FILE").map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
        })
    }

    pub(crate) fn viewer(&self) -> Viewer {
        self.member_id.map_or_else(Viewer::anonymous, Viewer::member)
    }
}

fn parse_radius(raw: &str) -> Result<f64> {
    let radius: f64 = raw
        .parse()
        .with_context(|| format!("BINMAP_RADIUS_M={raw:?} is not a number"))?;
    ensure!(
        radius.is_finite() && radius > 0.0,
        "BINMAP_RADIUS_M must be a positive number of metres"
    );
    Ok(radius)
}
