use clap::{Parser, Subcommand};
use metawriter::content::ContentRef;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "metawriter")]
#[command(about = "Read and rewrite document metadata in a content store", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides METAWRITER_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a local file under a fresh content reference
    Import(ImportArgs),
    /// Report whether metadata can be written for a content item
    Probe(RefArgs),
    /// Print a content item's metadata fields as JSON
    Show(RefArgs),
    /// Write metadata fields and save the item
    Set(SetArgs),
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// File to import
    pub file: PathBuf,

    /// MIME type to record, guessed from the file extension when omitted
    #[arg(long)]
    pub mime: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RefArgs {
    /// Content reference, e.g. workspace://SpacesStore/<id>
    pub reference: ContentRef,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Content reference, e.g. workspace://SpacesStore/<id>
    pub reference: ContentRef,

    /// Field assignment, repeatable
    #[arg(short = 'p', long = "property", value_name = "NAME=VALUE", value_parser = parse_assignment, required = true)]
    pub properties: Vec<(String, String)>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set() {
        let cli = Cli::try_parse_from([
            "metawriter",
            "--config",
            "custom.toml",
            "set",
            "workspace://SpacesStore/report.doc",
            "-p",
            "title=Quarterly = Q3",
            "-p",
            "author=Finance",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        let Commands::Set(args) = cli.command else {
            panic!("expected set");
        };
        assert_eq!(args.reference.id(), "report.doc");
        assert_eq!(
            args.properties,
            vec![
                ("title".to_string(), "Quarterly = Q3".to_string()),
                ("author".to_string(), "Finance".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Cli::try_parse_from(["metawriter", "probe", "not-a-reference"]).is_err());
        assert!(
            Cli::try_parse_from([
                "metawriter",
                "set",
                "workspace://SpacesStore/a.doc",
                "-p",
                "=x"
            ])
            .is_err()
        );
    }
}
