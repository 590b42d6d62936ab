//! Course setup commands: `init-course` and `create-mapping`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use canvas::{parse_course_url, CanvasGateway, CourseLocation};
use coursework::{AssignmentGateway, EntryStatus, MappingTable, Summary, SummaryEntry};
use tracing::{info, warn};

use super::{connect, single};
use crate::config::{Config, CONFIG_FILE_NAME, DEFAULT_MAPPING_FILE};
use crate::wizard;

/// Sets up a directory for one course: mapping table plus `config.toml`.
///
/// The access token is never written to disk.
pub async fn cmd_init_course(config: &Config, url: &str, dir: Option<PathBuf>) -> Result<Summary> {
    let location = parse_course_url(url)?;
    let columns = config.mapping.columns()?;
    let dir = dir.unwrap_or_else(|| PathBuf::from(format!("course-{}", location.course_id)));
    if dir.exists() {
        bail!(
            "{} already exists; choose another directory with --dir",
            dir.display()
        );
    }

    let token = match &config.canvas.access_token {
        Some(token) => token.clone(),
        None => wizard::access_token()?,
    };
    let gateway = CanvasGateway::new(
        &location.api_base,
        location.course_id,
        token,
        config.retry.backoff(),
    )?;

    let members = gateway
        .list_course_members()
        .await
        .context("Failed to list course students")?;
    let Some(table) = wizard::mapping_table(&members, &columns)? else {
        let mut summary = Summary::default();
        summary
            .notes
            .push("course has no students; nothing written".to_string());
        return Ok(summary);
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let mapping_path = dir.join(DEFAULT_MAPPING_FILE);
    let status = write_table(&table, &mapping_path, config)?;

    let config_path = dir.join(CONFIG_FILE_NAME);
    let course_config = course_config(config, &location);
    std::fs::write(&config_path, course_config.to_toml_without_token()?)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    info!(dir = %dir.display(), course = %location.course_id, "course initialised");

    println!(
        "Course ready. Set {} and run commands with --config {}",
        crate::config::TOKEN_ENV,
        config_path.display()
    );
    let mut summary = single(mapping_path.display().to_string(), status);
    summary.entries.push(SummaryEntry {
        entity: config_path.display().to_string(),
        status: EntryStatus::Succeeded,
    });
    Ok(summary)
}

/// Runs the mapping wizard against the configured course.
pub async fn cmd_create_mapping(
    config: &Config,
    output: Option<PathBuf>,
    force: bool,
) -> Result<Summary> {
    let path = output
        .or_else(|| config.mapping.path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MAPPING_FILE));
    if path.exists() && !force {
        bail!("{} already exists; pass --force to replace it", path.display());
    }
    let columns = config.mapping.columns()?;

    let gateway = connect(config)?;
    let members = gateway
        .list_course_members()
        .await
        .context("Failed to list course students")?;
    let Some(table) = wizard::mapping_table(&members, &columns)? else {
        let mut summary = Summary::default();
        summary
            .notes
            .push("course has no students; nothing written".to_string());
        return Ok(summary);
    };

    let status = write_table(&table, &path, config)?;
    Ok(single(path.display().to_string(), status))
}

/// The configuration written into a fresh course directory.
fn course_config(base: &Config, location: &CourseLocation) -> Config {
    let mut config = base.clone();
    config.canvas.base_url = Some(location.api_base.clone());
    config.canvas.course_id = Some(location.course_id.as_u64());
    config.canvas.access_token = None;
    config.mapping.path = Some(PathBuf::from(DEFAULT_MAPPING_FILE));
    config
}

fn write_table(table: &MappingTable, path: &Path, config: &Config) -> Result<EntryStatus> {
    let columns = config.mapping.columns()?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    table
        .write(BufWriter::new(file), columns.delimiter)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = table.rows.len(), "mapping table written");

    let incomplete = table.incomplete_rows();
    if incomplete == 0 {
        return Ok(EntryStatus::Succeeded);
    }
    warn!(
        incomplete,
        "some students lack an identity; fill them in before loading the table"
    );
    Ok(EntryStatus::Partial(format!(
        "{incomplete} row(s) missing an identity"
    )))
}
