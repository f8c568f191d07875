//! Subcommand implementations.

use catalog_core::{
    default_log_level, init_logging, init_stderr_logging, open_db, FsAuditStore, ImportConfig,
    ImportService, LogNotifier, SqliteCatalogRepository,
};
use log::info;
use serde_json::Value;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Settings shared by every subcommand.
pub struct Context {
    pub db: PathBuf,
    pub config: ImportConfig,
}

impl Context {
    /// Loads config, then starts logging with flags taking precedence.
    pub fn load(
        db: &Path,
        config_path: Option<&Path>,
        log_level: Option<String>,
        log_dir: Option<PathBuf>,
    ) -> Result<Self, Box<dyn Error>> {
        let config = match config_path {
            Some(path) => ImportConfig::load(path)?,
            None => ImportConfig::default(),
        };

        let level = log_level
            .or_else(|| config.log_level.clone())
            .unwrap_or_else(|| default_log_level().to_string());
        match log_dir.or_else(|| config.log_dir.clone()) {
            Some(dir) => init_logging(&level, dir)?,
            None => init_stderr_logging(&level)?,
        }

        Ok(Self {
            db: db.to_path_buf(),
            config,
        })
    }
}

pub fn import(
    ctx: &Context,
    file: &Path,
    corpus: &str,
    document_limit: Option<usize>,
    audit_dir: Option<PathBuf>,
) -> CommandResult {
    let request: Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
    let audit_dir = audit_dir.unwrap_or_else(|| ctx.config.audit_dir.clone());
    let service = ImportService::new(
        ctx.config.clone(),
        Arc::new(FsAuditStore::new(audit_dir)),
        Arc::new(LogNotifier),
    );

    let ticket = service.submit(&ctx.db, request, corpus, document_limit);
    println!("accepted correlation_id={}", ticket.correlation_id);

    let report = ticket
        .wait()
        .ok_or("import worker terminated unexpectedly")?;
    let result = report.outcome?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn register_corpus(
    ctx: &Context,
    import_id: &str,
    title: &str,
    organisation: &str,
    taxonomy: &Path,
) -> CommandResult {
    let taxonomy: Value = serde_json::from_str(&std::fs::read_to_string(taxonomy)?)?;
    let conn = open_db(&ctx.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)?;
    repo.register_corpus(import_id, title, organisation, &taxonomy)?;
    println!("registered corpus {import_id}");
    Ok(())
}

pub fn add_geography(ctx: &Context, value: &str, display: Option<&str>) -> CommandResult {
    let conn = open_db(&ctx.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)?;
    let id = repo.add_geography(value, display.unwrap_or(value))?;
    info!("event=geography_add module=cli status=ok value={value} id={id}");
    println!("geography {value} id={id}");
    Ok(())
}

pub fn add_language(ctx: &Context, name: &str, code: Option<&str>) -> CommandResult {
    let conn = open_db(&ctx.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)?;
    let id = repo.add_language(name, code)?;
    info!("event=language_add module=cli status=ok name={name} id={id}");
    println!("language {name} id={id}");
    Ok(())
}
