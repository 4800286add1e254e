use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use persona_core::{
    FaceDetector, Gender, ModelProfile, OnnxProvider, PrototypeCatalog, TraitScorer, KNOWN_MODELS,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

const DISCLAIMER: &str =
    "note: results are illustrative artifacts of embedding geometry, not a valid personality assessment";

#[derive(Parser)]
#[command(name = "persona", about = "Estimate Big-Five trait directions from face photos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by commands that need the prototype catalog.
#[derive(clap::Args)]
struct CatalogArgs {
    /// Directory containing the prototype images [env: PERSONA_PROTOTYPE_DIR]
    #[arg(short, long)]
    prototypes: Option<PathBuf>,
    /// Catalog TOML overriding the builtin Big-Five table [env: PERSONA_CATALOG]
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one or more face photos
    Estimate {
        /// Subject gender: male or female
        #[arg(short, long)]
        gender: String,
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Embedding model name [env: PERSONA_MODEL]
        #[arg(short, long)]
        model: Option<String>,
        /// Directory containing <model>.onnx and det_10g.onnx [env: PERSONA_MODEL_DIR]
        #[arg(long)]
        model_dir: Option<PathBuf>,
        /// Treat similarity gaps up to this value as ties [env: PERSONA_TIE_TOLERANCE]
        #[arg(long)]
        tie_tolerance: Option<f64>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
        /// Face photos to score
        #[arg(required = true)]
        photos: Vec<PathBuf>,
    },
    /// List the prototype images a gender needs and whether they exist
    Prototypes {
        #[arg(short, long)]
        gender: String,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// List supported embedding models
    Models,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Estimate {
            gender,
            catalog,
            model,
            model_dir,
            tie_tolerance,
            json,
            photos,
        } => {
            apply_catalog_args(&mut config, catalog);
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(dir) = model_dir {
                config.model_dir = dir;
            }
            if tie_tolerance.is_some() {
                config.tie_tolerance = tie_tolerance;
            }
            estimate(&config, &gender, &photos, json)?;
        }
        Commands::Prototypes { gender, catalog } => {
            apply_catalog_args(&mut config, catalog);
            list_prototypes(&config, &gender)?;
        }
        Commands::Models => {
            for m in KNOWN_MODELS.iter() {
                println!(
                    "{:<12} input {}x{}  dim {}  {}",
                    m.name,
                    m.input_size,
                    m.input_size,
                    m.embedding_dim,
                    m.model_path(&config.model_dir).display()
                );
            }
            println!(
                "{:<12} SCRFD face detector  {}",
                "detector",
                FaceDetector::model_path(&config.model_dir).display()
            );
        }
    }

    Ok(())
}

fn apply_catalog_args(config: &mut Config, args: CatalogArgs) {
    if let Some(dir) = args.prototypes {
        config.prototype_dir = dir;
    }
    if args.catalog.is_some() {
        config.catalog_path = args.catalog;
    }
}

fn load_catalog(config: &Config) -> Result<PrototypeCatalog> {
    let catalog = match &config.catalog_path {
        Some(path) => PrototypeCatalog::load(&config.prototype_dir, path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => PrototypeCatalog::builtin(&config.prototype_dir).context("loading builtin catalog")?,
    };
    Ok(catalog)
}

fn estimate(config: &Config, gender: &str, photos: &[PathBuf], json: bool) -> Result<()> {
    // Reject bad input before loading any model.
    gender.parse::<Gender>()?;
    if ModelProfile::lookup(&config.model).is_none() {
        anyhow::bail!(
            "unsupported model '{}' (run `persona models` for the list)",
            config.model
        );
    }
    let policy = config.equality_policy()?;

    let catalog = load_catalog(config)?;
    let provider = OnnxProvider::new(&config.model_dir).with_intra_threads(config.intra_threads);
    let mut scorer = TraitScorer::new(provider, catalog, config.model.clone()).with_policy(policy);

    eprintln!("{DISCLAIMER}");

    for photo in photos {
        let report = scorer
            .score_photo(photo, gender)
            .with_context(|| format!("scoring {}", photo.display()))?;

        if json {
            let value = serde_json::json!({
                "photo": photo.display().to_string(),
                "gender": gender,
                "model": config.model,
                "traits": report.rounded(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            if photos.len() > 1 {
                println!("{}:", photo.display());
            }
            print!("{report}");
        }
    }

    tracing::info!(
        photos = photos.len(),
        prototypes = scorer.prototypes().cached(),
        "scoring complete"
    );
    Ok(())
}

fn list_prototypes(config: &Config, gender: &str) -> Result<()> {
    let gender: Gender = gender.parse()?;
    let catalog = load_catalog(config)?;

    let mut missing = 0usize;
    for (kind, paths) in catalog.prototype_paths(gender) {
        for (pole, path) in [("high", &paths.high), ("low", &paths.low)] {
            let status = if path.exists() {
                "ok"
            } else {
                missing += 1;
                "MISSING"
            };
            println!("{:<20} {:<4} {:<8} {}", kind.name(), pole, status, path.display());
        }
    }

    if missing > 0 {
        anyhow::bail!("{missing} prototype image(s) missing under {}", catalog.base_dir().display());
    }
    Ok(())
}
