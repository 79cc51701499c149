//! pgrls - render policy manifests to PostgreSQL DDL.
//!
//! The SQL goes to stdout; logs and errors go to stderr.

mod config;
mod error;

use std::io::Read;

use clap::Parser;
use pgrls::PolicyManifest;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Args, CliConfig, ManifestSource};
use error::CliError;

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pgrls_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = CliConfig::from(&args);

    match run(&config) {
        Ok(sql) => println!("{sql};"),
        Err(e) => {
            tracing::debug!(error = ?e, "render failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn read_manifest(source: &ManifestSource) -> Result<String, CliError> {
    let read = match source {
        ManifestSource::Stdin => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input).map(|_| input)
        }
        ManifestSource::File(path) => std::fs::read_to_string(path),
    };
    read.map_err(|error| CliError::Read {
        source_name: source.clone(),
        error,
    })
}

fn run(config: &CliConfig) -> Result<String, CliError> {
    let input = read_manifest(&config.source)?;
    render(&input, config)
}

fn render(input: &str, config: &CliConfig) -> Result<String, CliError> {
    let manifest_error = |error| CliError::Manifest {
        source_name: config.source.clone(),
        error,
    };

    let manifest = PolicyManifest::from_json(input).map_err(manifest_error)?;
    tracing::info!(
        source = %config.source,
        groups = manifest.groups.len(),
        tables = manifest.tables().len(),
        "manifest loaded"
    );

    let sql = manifest
        .render(&config.render, config.enable_rls)
        .map_err(manifest_error)?;
    tracing::info!(
        include_indexes = config.render.include_indexes,
        include_comments = config.render.include_comment,
        enable_rls = config.enable_rls,
        "rendered policies"
    );
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "groups": [{
            "name": "posts",
            "policies": [{ "table": "posts", "template": { "kind": "public_access" } }]
        }]
    }"#;

    fn config(args: &[&str]) -> CliConfig {
        CliConfig::from(&Args::try_parse_from(args).unwrap())
    }

    #[test]
    fn test_render_manifest() {
        let sql = render(MANIFEST, &config(&["pgrls", "-", "--enable-rls"])).unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"posts\" ENABLE ROW LEVEL SECURITY;\n\n\
             CREATE POLICY \"posts_public_read\" ON \"posts\" FOR SELECT USING (\"is_public\" = TRUE)"
        );
    }

    #[test]
    fn test_render_error_names_source() {
        let err = render("{}", &config(&["pgrls", "policies.json"])).unwrap_err();
        assert!(err.to_string().starts_with("policies.json: failed to parse manifest"));
    }

    #[test]
    fn test_missing_file() {
        let err = run(&config(&["pgrls", "/nonexistent/pgrls/manifest.json"])).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }
}
