//! Blueprint store command line

mod archive;
mod registry;

use anyhow::{Context, Result};
use blueprintfs::{Blueprint, OsFs};
use bpcache::{
    derive_key, ComponentIdentity, GarbageCollectionConfig, ResourceIdentity, Store, StoreConfig,
    TypedContent,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::archive::{export_blueprint, extract_archive, ExtractedBlueprint};

/// Store root used when neither the config file nor the flags name one
const DEFAULT_STORE_PATH: &str = "./blueprints";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store root directory
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Store capacity such as 10Gi; 0 is unbounded
    #[arg(short, long)]
    size: Option<String>,

    /// Usage fraction that starts garbage collection
    #[arg(long)]
    gc_high_threshold: Option<f64>,

    /// Usage fraction garbage collection frees down to
    #[arg(long)]
    gc_low_threshold: Option<f64>,

    /// Interval of the hit counter reset such as 1h
    #[arg(long)]
    reset_interval: Option<String>,

    /// Treat every lookup as a miss
    #[arg(long)]
    disable_cache: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a blueprint directory or tar/tar.gz archive under a key
    Put { key: String, source: PathBuf },

    /// Store a blueprint under the key derived from its component identity
    Add {
        #[command(flatten)]
        identity: IdentityArgs,
        source: PathBuf,
    },

    /// Print the key derived from a component identity
    Key {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show a stored blueprint
    Get { key: String },

    /// Write a stored blueprint to a tar.gz archive
    Export { key: String, dest: PathBuf },

    /// Remove a stored blueprint
    Rm { key: String },

    /// List stored blueprints in eviction order
    Ls,

    /// Run garbage collection
    Gc,

    /// Print store statistics
    Stats,

    /// Remove every stored blueprint
    Clear,
}

#[derive(clap::Args, Debug)]
struct IdentityArgs {
    /// Component name
    #[arg(long)]
    component_name: String,

    /// Component version
    #[arg(long)]
    component_version: String,

    /// Name of the blueprint resource
    #[arg(long, default_value = "blueprint")]
    resource_name: String,

    /// Version of the blueprint resource; defaults to the component version
    #[arg(long)]
    resource_version: Option<String>,

    /// Raw repository context the component was resolved from
    #[arg(long)]
    repository_context: Option<String>,

    /// Digest of the blueprint blob, required by the digest index
    #[arg(long)]
    digest: Option<String>,
}

impl IdentityArgs {
    fn key(&self, store: &Store) -> Result<String> {
        let component = ComponentIdentity {
            repository_context: self.repository_context.as_ref().map(|c| c.as_bytes().to_vec()),
            name: self.component_name.clone(),
            version: self.component_version.clone(),
        };
        let resource = ResourceIdentity {
            name: self.resource_name.clone(),
            version: self
                .resource_version
                .clone()
                .unwrap_or_else(|| self.component_version.clone()),
        };
        derive_key(
            store.index_method(),
            &component,
            &resource,
            self.digest.as_deref(),
        )
        .context("Failed to derive cache key")
    }
}

/// A decoded source blueprint plus the extraction directory backing it
struct Source {
    blueprint: Blueprint,
    _extracted: Option<ExtractedBlueprint>,
}

fn load_source(path: &Path) -> Result<Source> {
    if path.is_dir() {
        let blueprint = Blueprint::from_path(Arc::new(OsFs), path)
            .with_context(|| format!("Failed to decode blueprint in {:?}", path))?;
        return Ok(Source {
            blueprint,
            _extracted: None,
        });
    }

    let extracted = extract_archive(path)?;
    info!("Importing blueprint from {}", extracted.root().display());
    Ok(Source {
        blueprint: extracted.blueprint()?,
        _extracted: Some(extracted),
    })
}

/// Read the config file (if any) and overlay the command line flags
fn load_config(args: &Args) -> Result<StoreConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .context(format!("Failed to read config file: {:?}", path))?;
            serde_json::from_str(&raw)
                .context(format!("Failed to parse config file: {:?}", path))?
        }
        None => StoreConfig::default(),
    };

    if let Some(path) = &args.path {
        config.path = path.clone();
    }
    if config.path.as_os_str().is_empty() {
        config.path = PathBuf::from(DEFAULT_STORE_PATH);
    }
    if args.disable_cache {
        config.disable_cache = true;
    }

    config.garbage_collection.merge(&GarbageCollectionConfig {
        size: args.size.clone().unwrap_or_default(),
        gc_high_threshold: args.gc_high_threshold.unwrap_or(0.0),
        gc_low_threshold: args.gc_low_threshold.unwrap_or(0.0),
        reset_interval: args.reset_interval.clone().unwrap_or_default(),
        preserved_hits_proportion: 0.0,
    });
    Ok(config)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlueprintInfo {
    key: String,
    path: PathBuf,
    api_version: String,
    kind: String,
    annotations: BTreeMap<String, String>,
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreInfo {
    root: PathBuf,
    capacity: u64,
    current_size: u64,
    usage: f64,
    entries: usize,
    stats: bpcache::StatsSnapshot,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn store_blueprint(store: &Store, key: &str, source: &Path, json: bool) -> Result<()> {
    let source = load_source(source)?;
    if !store.put(key, &TypedContent::blueprint(source.blueprint))? {
        anyhow::bail!("Refusing to store a blueprint under an empty key");
    }
    info!("Stored blueprint under {}", key);

    // the maintenance thread stops with the process, so collect here
    let report = store.run_garbage_collection();
    if !report.evicted.is_empty() {
        info!("Garbage collected {} blueprint(s)", report.evicted.len());
    }

    if json {
        print_json(&serde_json::json!({ "key": key, "gc": report }))
    } else {
        println!("{}", key);
        Ok(())
    }
}

fn run(args: &Args) -> Result<()> {
    let store = registry::store();

    match &args.command {
        Command::Put { key, source } => store_blueprint(&store, key, source, args.json)?,
        Command::Add { identity, source } => {
            let key = identity.key(&store)?;
            store_blueprint(&store, &key, source, args.json)?;
        }
        Command::Key { identity } => println!("{}", identity.key(&store)?),
        Command::Get { key } => {
            let Some(bp) = store.get(key)? else {
                anyhow::bail!("Blueprint not found: {}", key);
            };
            let info = BlueprintInfo {
                key: key.clone(),
                path: bp.root().to_path_buf(),
                api_version: bp.manifest().api_version.clone(),
                kind: bp.manifest().kind.clone(),
                annotations: bp.annotations().clone(),
                files: bp.files()?,
            };
            if args.json {
                print_json(&info)?;
            } else {
                println!("Key:        {}", info.key);
                println!("Path:       {}", info.path.display());
                println!("APIVersion: {}", info.api_version);
                println!("Kind:       {}", info.kind);
                for (name, value) in &info.annotations {
                    println!("Annotation: {}={}", name, value);
                }
                for file in &info.files {
                    println!("  {}", file.display());
                }
            }
        }
        Command::Export { key, dest } => {
            let Some(bp) = store.get(key)? else {
                anyhow::bail!("Blueprint not found: {}", key);
            };
            let size = export_blueprint(&bp, dest)?;
            println!("{} ({} bytes)", dest.display(), size);
        }
        Command::Rm { key } => {
            if !store.remove(key)? {
                warn!("No blueprint stored under {}", key);
            }
        }
        Command::Ls => {
            let entries = store.priority_list();
            if args.json {
                print_json(&entries)?;
            } else {
                println!("{:<66} {:>12} {:>6}  CREATED", "KEY", "SIZE", "HITS");
                for entry in entries {
                    println!(
                        "{:<66} {:>12} {:>6}  {}",
                        entry.key,
                        entry.size,
                        entry.hits,
                        entry.created_at.to_rfc3339()
                    );
                }
            }
        }
        Command::Gc => {
            let report = store.run_garbage_collection();
            if args.json {
                print_json(&report)?;
            } else {
                println!(
                    "Usage {:.2}% -> {:.2}%, evicted {}, failed {}, freed {} bytes",
                    report.usage_before * 100.0,
                    report.usage_after * 100.0,
                    report.evicted.len(),
                    report.failed.len(),
                    report.freed_bytes
                );
            }
        }
        Command::Stats => {
            let info = StoreInfo {
                root: store.root().to_path_buf(),
                capacity: store.capacity(),
                current_size: store.current_size(),
                usage: store.usage(),
                entries: store.len(),
                stats: store.stats().snapshot(),
            };
            if args.json {
                print_json(&info)?;
            } else {
                println!("Root:         {}", info.root.display());
                println!("Capacity:     {} bytes", info.capacity);
                println!("Current size: {} bytes", info.current_size);
                println!("Usage:        {:.2}%", info.usage * 100.0);
                println!("Entries:      {}", info.entries);
                println!("Hit ratio:    {:.2}", info.stats.hit_ratio);
                println!("Evictions:    {}", info.stats.evictions);
            }
        }
        Command::Clear => {
            let removed = store.clear()?;
            println!("Removed {} blueprint(s)", removed);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let store = Store::open(Arc::new(OsFs), &config)
        .context(format!("Failed to open blueprint store at {:?}", config.path))?;
    registry::set_store(store)?;

    let result = run(&args);
    registry::store()
        .close()
        .context("Failed to close blueprint store")?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprintfs::BLUEPRINT_FILE_NAME;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("store.json");
        fs::write(
            &config_path,
            r#"{"path": "/var/cache/bp", "size": "1Gi", "gcLowThreshold": 0.5, "indexMethod": "BlueprintDigestIndex"}"#,
        )
        .unwrap();

        let args = parse(&[
            "bpcd",
            "--config",
            config_path.to_str().unwrap(),
            "--size",
            "2Gi",
            "--disable-cache",
            "ls",
        ]);
        let config = load_config(&args).unwrap();

        assert_eq!(config.path, PathBuf::from("/var/cache/bp"));
        assert_eq!(config.garbage_collection.size, "2Gi");
        assert_eq!(config.garbage_collection.gc_low_threshold, 0.5);
        assert_eq!(config.index_method, bpcache::IndexMethod::BlueprintDigest);
        assert!(config.disable_cache);
    }

    #[test]
    fn test_default_path() {
        let config = load_config(&parse(&["bpcd", "stats"])).unwrap();

        assert_eq!(config.path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.garbage_collection.resolve().unwrap().capacity, 0);
    }

    #[test]
    fn test_resource_version_defaults_to_component_version() {
        let args = parse(&[
            "bpcd",
            "key",
            "--component-name",
            "example.com/landscape",
            "--component-version",
            "v1.2.0",
        ]);
        let Command::Key { identity } = &args.command else {
            panic!("expected key command");
        };

        let store = Store::unbounded_in_memory();
        let key = identity.key(&store).unwrap();
        let expected = bpcache::component_identity_key(
            &ComponentIdentity {
                repository_context: None,
                name: "example.com/landscape".to_string(),
                version: "v1.2.0".to_string(),
            },
            &ResourceIdentity {
                name: "blueprint".to_string(),
                version: "v1.2.0".to_string(),
            },
        );
        assert_eq!(key, expected);
    }

    #[test]
    fn test_store_blueprint_from_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("bp");
        fs::create_dir_all(&source).unwrap();
        fs::write(
            source.join(BLUEPRINT_FILE_NAME),
            "apiVersion: landscaper.gardener.cloud/v1alpha1\nkind: Blueprint\n",
        )
        .unwrap();

        let config = StoreConfig::new(temp.path().join("store"), "1Mi");
        let store = Store::open(Arc::new(OsFs), &config).unwrap();
        store_blueprint(&store, "my-key", &source, false).unwrap();

        let bp = store.get("my-key").unwrap().unwrap();
        assert_eq!(bp.manifest().kind, "Blueprint");
        assert!(store.root().join("my-key").join(BLUEPRINT_FILE_NAME).is_file());
    }

    #[test]
    fn test_store_blueprint_rejects_empty_key() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("bp");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join(BLUEPRINT_FILE_NAME), "kind: Blueprint\n").unwrap();

        let store = Store::unbounded_in_memory();
        assert!(store_blueprint(&store, "", &source, false).is_err());
    }
}
