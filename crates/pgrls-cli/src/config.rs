//! Command-line arguments and the configuration derived from them.

use std::path::PathBuf;

use clap::Parser;
use pgrls::RenderOptions;

/// Argument value that selects stdin.
pub const STDIN_MARKER: &str = "-";

/// Render a pgrls policy manifest to PostgreSQL DDL.
#[derive(Debug, Parser)]
#[command(name = "pgrls")]
#[command(version, about = "Render a JSON policy manifest to PostgreSQL Row Level Security DDL")]
pub struct Args {
    /// Manifest file, or `-` to read stdin.
    pub manifest: String,

    /// Emit CREATE INDEX statements for columns the predicates filter on.
    #[arg(long)]
    pub include_indexes: bool,

    /// Emit COMMENT ON POLICY statements for policies with a description.
    #[arg(long)]
    pub include_comments: bool,

    /// Emit ALTER TABLE ... ENABLE ROW LEVEL SECURITY for every table first.
    #[arg(long)]
    pub enable_rls: bool,
}

/// Where the manifest is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// Standard input.
    Stdin,
    /// A file on disk.
    File(PathBuf),
}

impl std::fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestSource::Stdin => write!(f, "<stdin>"),
            ManifestSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolved CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Manifest location.
    pub source: ManifestSource,
    /// Options passed to the renderer.
    pub render: RenderOptions,
    /// Prefix the output with ENABLE ROW LEVEL SECURITY statements.
    pub enable_rls: bool,
}

impl From<&Args> for CliConfig {
    fn from(args: &Args) -> Self {
        let source = if args.manifest == STDIN_MARKER {
            ManifestSource::Stdin
        } else {
            ManifestSource::File(PathBuf::from(&args.manifest))
        };

        Self {
            source,
            render: RenderOptions {
                include_indexes: args.include_indexes,
                include_comment: args.include_comments,
            },
            enable_rls: args.enable_rls,
        }
    }
}
