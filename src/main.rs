mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use metawriter::config::Config;
use metawriter::content::{ContentRef, ObjectContentService};
use metawriter::factory::MetadataContentFactory;
use metawriter::handlers::{HandlerRegistry, MetadataValue};
use metawriter::observability::{self, Metrics};
use std::collections::BTreeMap;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone())?,
        None => Config::load()?,
    };
    observability::init_tracing(&config.logging.filter);

    // The memory provider lives only as long as this process
    let service = Arc::new(ObjectContentService::from_config(&config.storage)?);
    let registry = Arc::new(HandlerRegistry::from_config(&config.handlers)?);
    let metrics = Arc::new(Metrics::new());
    let factory =
        MetadataContentFactory::new(service.clone(), registry)?.with_metrics(metrics.clone());
    tracing::debug!(handlers = ?factory.registry().handler_names(), "Factory ready");

    match cli.command {
        Commands::Import(args) => {
            let data = std::fs::read(&args.file)?;
            let mimetype = args.mime.or_else(|| {
                mime_guess::from_path(&args.file)
                    .first_raw()
                    .map(str::to_string)
            });
            let extension = args.file.extension().and_then(|ext| ext.to_str());

            let content_ref = ContentRef::generate(extension);
            service.put_content(&content_ref, data, mimetype.as_deref())?;
            tracing::info!(%content_ref, file = %args.file.display(), "Imported file");
            println!("{content_ref}");
        }
        Commands::Probe(args) => {
            if factory.supports_metadata_write(&args.reference)? {
                let handler = factory.handler_for(&args.reference)?.unwrap_or_default();
                println!("{}: supported ({handler})", args.reference);
            } else {
                println!("{}: not supported", args.reference);
            }
        }
        Commands::Show(args) => {
            let facade = factory.create_content(&args.reference)?;
            let fields: BTreeMap<String, MetadataValue> = facade.fields().into_iter().collect();
            facade.abort();
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        Commands::Set(args) => {
            let mut facade = factory.create_content(&args.reference)?;
            for (name, value) in args.properties {
                facade.write_metadata(&name, MetadataValue::Text(value))?;
            }
            facade.save()?;
            tracing::info!(content_ref = %args.reference, "Saved metadata");
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    tracing::debug!(metrics = ?metrics.snapshot(), "Done");
    Ok(())
}
