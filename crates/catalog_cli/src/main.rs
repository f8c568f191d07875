//! Catalog CLI entry point.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{CommandResult, Context};

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Dispatches one parsed command; only catalog commands load config and logging.
fn run(cli: Cli) -> CommandResult {
    let Cli {
        command,
        db,
        config,
        log_level,
        log_dir,
    } = cli;
    let load = move || Context::load(&db, config.as_deref(), log_level, log_dir);

    match command {
        Commands::Version => {
            println!("catalog_core version={}", catalog_core::core_version());
            Ok(())
        }
        Commands::Import {
            file,
            corpus,
            document_limit,
            audit_dir,
        } => load()
            .and_then(|ctx| commands::import(&ctx, &file, &corpus, document_limit, audit_dir)),
        Commands::RegisterCorpus {
            import_id,
            title,
            organisation,
            taxonomy,
        } => load().and_then(|ctx| {
            commands::register_corpus(&ctx, &import_id, &title, &organisation, &taxonomy)
        }),
        Commands::AddGeography { value, display } => {
            load().and_then(|ctx| commands::add_geography(&ctx, &value, display.as_deref()))
        }
        Commands::AddLanguage { name, code } => {
            load().and_then(|ctx| commands::add_language(&ctx, &name, code.as_deref()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn version_runs_without_loading_config() {
        let cli = Cli::try_parse_from([
            "catalog",
            "--config",
            "/nonexistent/catalog.toml",
            "version",
        ])
        .unwrap();
        assert!(run(cli).is_ok());
    }

    #[test]
    fn catalog_commands_load_config_first() {
        let cli = Cli::try_parse_from([
            "catalog",
            "--config",
            "/nonexistent/catalog.toml",
            "add-language",
            "English",
        ])
        .unwrap();
        assert!(run(cli).is_err());
    }
}
