use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use resel_core_types::{ArtifactId, SelectorProfile};
use resel_locator::{BuildPipeline, RawElementRecord};
use resel_profile_store::{ProfileStore, StoreErrKind};

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct BuildArgs {
    /// Captured element records, a JSON array or one JSON object per line
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    /// Owning artifact the profiles belong to
    #[arg(long)]
    pub artifact: String,

    /// Replace existing profiles with a new version instead of skipping them
    #[arg(long)]
    pub replace: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Created,
    Replaced,
    Skipped,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct BuildRow {
    pub element: String,
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildRow {
    fn stored(profile: &SelectorProfile, status: BuildStatus) -> Self {
        Self {
            element: profile.logical_id.to_string(),
            status,
            version: Some(profile.version),
            primary: Some(format!(
                "{}={}",
                profile.primary.strategy.name(),
                profile.primary.value
            )),
            error: None,
        }
    }

    fn failed(element: String, error: impl ToString) -> Self {
        Self {
            element,
            status: BuildStatus::Failed,
            version: None,
            primary: None,
            error: Some(error.to_string()),
        }
    }
}

pub async fn cmd_build(args: BuildArgs, ctx: &CliContext) -> Result<()> {
    let records = read_records(&args.input).await?;
    let artifact = ArtifactId::new(args.artifact);
    info!(
        artifact = %artifact,
        records = records.len(),
        "building selector profiles"
    );

    let pipeline = BuildPipeline::new(&ctx.config().locator);
    let store = ctx.store().await;
    let mut rows = Vec::new();
    for entry in pipeline.run(&artifact, records) {
        let row = match entry.result {
            Ok(profile) => persist(store.as_ref(), profile, args.replace).await,
            Err(err) => {
                warn!(element = %entry.label, error = %err, "profile build failed");
                BuildRow::failed(entry.label, err)
            }
        };
        rows.push(row);
    }

    ctx.output().emit(&rows, |rows| {
        for row in rows {
            match row.status {
                BuildStatus::Failed => println!(
                    "{:<9} {}  {}",
                    "failed",
                    row.element,
                    row.error.as_deref().unwrap_or_default()
                ),
                status => println!(
                    "{:<9} {} v{}  {}",
                    format!("{status:?}").to_lowercase(),
                    row.element,
                    row.version.unwrap_or_default(),
                    row.primary.as_deref().unwrap_or_default()
                ),
            }
        }
    })?;

    let failed = rows
        .iter()
        .filter(|row| row.status == BuildStatus::Failed)
        .count();
    if failed > 0 {
        bail!("{failed} of {} elements could not be built", rows.len());
    }
    Ok(())
}

async fn persist(store: &dyn ProfileStore, profile: SelectorProfile, replace: bool) -> BuildRow {
    let key = profile.key();
    match store.create(profile.clone()).await {
        Ok(()) => BuildRow::stored(&profile, BuildStatus::Created),
        Err(err) if matches!(err.kind(), StoreErrKind::AlreadyExists(_)) => {
            if !replace {
                return match store.get(&key).await {
                    Ok(current) => BuildRow::stored(&current, BuildStatus::Skipped),
                    Err(err) => BuildRow::failed(key.logical.to_string(), err),
                };
            }
            match replace_profile(store, profile).await {
                Ok(next) => BuildRow::stored(&next, BuildStatus::Replaced),
                Err(err) => BuildRow::failed(key.logical.to_string(), err),
            }
        }
        Err(err) => BuildRow::failed(key.logical.to_string(), err),
    }
}

async fn replace_profile(
    store: &dyn ProfileStore,
    mut profile: SelectorProfile,
) -> Result<SelectorProfile> {
    let key = profile.key();
    let current = store.get(&key).await?;
    profile.version = current.version + 1;
    store
        .compare_and_swap(&key, current.version, profile.clone())
        .await
        .with_context(|| format!("replacing {key}"))?;
    Ok(profile)
}

async fn read_records(path: &Path) -> Result<Vec<RawElementRecord>> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Accepts a JSON array or JSON lines; blank lines are ignored.
fn parse_records(raw: &str) -> Result<Vec<RawElementRecord>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{"logical_id":"ok","platform":"android","tree":{"nodes":[{"attributes":{"resource-id":"ok"}}]},"target":0}"#;

    #[test]
    fn parses_array_and_lines() {
        let array = parse_records(&format!("[{RECORD},{RECORD}]")).expect("array");
        assert_eq!(array.len(), 2);

        let lines = parse_records(&format!("{RECORD}\n\n{RECORD}\n")).expect("lines");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].logical_id.as_deref(), Some("ok"));
    }

    #[test]
    fn bad_line_is_located() {
        let err = parse_records(&format!("{RECORD}\n{{oops\n")).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
