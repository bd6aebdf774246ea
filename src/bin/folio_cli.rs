//! Folio CLI - JSON bridge to the catalogue design engine
//!
//! Commands: templates, themes, check, best-themes, best-templates,
//! validate-content, populate, watch
//! Outputs JSON to stdout, diagnostics to stderr
//! Returns 2 on a domain failure (incompatible pair, invalid content)

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use folio_core::{
    schema, AssetLibrary, Category, DataBinder, Orchestrator, RuleSet, ScoringPolicy,
    AssetWatcher, WatchConfig,
};

#[derive(Parser)]
#[command(name = "folio-cli")]
#[command(about = "Folio CLI - Catalogue Design Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Asset root holding templates/, themes/ and rules.json
    #[arg(short, long, default_value = "assets")]
    assets_dir: PathBuf,

    /// Scoring policy override (JSON)
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Rules file to use instead of <assets-dir>/rules.json
    #[arg(long)]
    rules: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List templates
    Templates {
        #[arg(short, long)]
        category: Option<Category>,
    },

    /// List themes
    Themes {
        #[arg(short, long)]
        category: Option<Category>,
    },

    /// Score one template/theme pair
    Check {
        #[arg(short, long)]
        template: String,

        #[arg(short = 'm', long)]
        theme: String,
    },

    /// Best themes for a template
    BestThemes {
        #[arg(short, long)]
        template: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Best templates for a theme
    BestTemplates {
        #[arg(short = 'm', long)]
        theme: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Validate a content instance
    ValidateContent {
        /// JSON payload (content instance)
        #[arg(short, long)]
        payload: String,
    },

    /// Populate a template (or a markup file) with content
    Populate {
        #[arg(short, long)]
        template: Option<String>,

        /// Markup file to populate instead of a registered template
        #[arg(long)]
        markup: Option<PathBuf>,

        /// JSON payload (content instance)
        #[arg(short, long)]
        payload: String,
    },

    /// Watch the asset root and report the matrix after each change
    Watch {
        #[arg(long, default_value_t = 500)]
        debounce_ms: u64,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn emit<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&format!("Failed to encode output: {}", e)),
    }
}

fn fail(message: &str) -> ExitCode {
    println!("{}", json!({ "success": false, "error": message }));
    ExitCode::FAILURE
}

fn load_library(cli: &Cli) -> Result<AssetLibrary, String> {
    let mut library = AssetLibrary::load_from_dir(&cli.assets_dir)
        .map_err(|e| format!("Failed to load assets: {}", e))?;
    if let Some(path) = &cli.rules {
        let rules = RuleSet::load_from_file(path).map_err(|e| format!("Failed to load rules: {}", e))?;
        library.replace_rules(rules);
    }
    if let Some(path) = &cli.policy {
        let policy = ScoringPolicy::load_from_file(path).map_err(|e| format!("Failed to load policy: {}", e))?;
        library.set_policy(policy);
    }
    Ok(library)
}

fn parse_content(payload: &str) -> Result<folio_core::ContentInstance, ExitCode> {
    let raw: Value = serde_json::from_str(payload).map_err(|e| fail(&format!("Invalid payload: {}", e)))?;
    schema::validate(&raw).map_err(|e| {
        println!("{}", json!({ "valid": false, "violations": e.violations }));
        ExitCode::from(2)
    })
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let library = match load_library(&cli) {
        Ok(library) => library,
        Err(message) => return fail(&message),
    };

    match &cli.command {
        Commands::Templates { category } => {
            let templates: Vec<_> = match category {
                Some(c) => library.templates().by_category(*c),
                None => library.templates().all(),
            }
            .into_iter()
            .map(|t| json!({
                "id": t.id,
                "name": t.name,
                "category": t.category,
                "version": t.version,
                "kind": t.kind,
                "pageCount": t.page_count,
                "premium": t.premium,
            }))
            .collect();
            emit(&templates)
        }

        Commands::Themes { category } => {
            let themes: Vec<_> = match category {
                Some(c) => library.themes().by_category(*c),
                None => library.themes().all(),
            }
            .into_iter()
            .map(|t| json!({
                "id": t.id,
                "name": t.name,
                "category": t.category,
                "premium": t.premium,
                "features": t.features,
            }))
            .collect();
            emit(&themes)
        }

        Commands::Check { template, theme } => {
            let result = library.test(template, theme);
            let code = emit(&result);
            if result.compatible {
                code
            } else {
                ExitCode::from(2)
            }
        }

        Commands::BestThemes { template, limit } => match library.best_themes(template, *limit) {
            Ok(results) => emit(&results),
            Err(e) => fail(&e.to_string()),
        },

        Commands::BestTemplates { theme, limit } => match library.best_templates(theme, *limit) {
            Ok(results) => emit(&results),
            Err(e) => fail(&e.to_string()),
        },

        Commands::Populate { template, markup, payload } => {
            let content = match parse_content(payload) {
                Ok(content) => content,
                Err(code) => return code,
            };
            match (markup, template) {
                (Some(path), _) => populate_markup(path, &content),
                (None, Some(template)) => {
                    let orchestrator = Orchestrator::in_memory(library);
                    match orchestrator.load_template(template) {
                        Ok(loaded) => {
                            let binder = DataBinder::nodes();
                            let pages: Vec<_> = loaded
                                .documents()
                                .into_iter()
                                .map(|doc| binder.populate(doc, &content))
                                .collect();
                            emit(&json!({ "success": true, "template": template, "pages": pages }))
                        }
                        Err(e) => fail(&e.to_string()),
                    }
                }
                (None, None) => fail("populate needs --template or --markup"),
            }
        }

        Commands::ValidateContent { payload } => {
            let raw: Value = match serde_json::from_str(payload) {
                Ok(raw) => raw,
                Err(e) => return fail(&format!("Invalid payload: {}", e)),
            };
            match schema::validate(&raw) {
                Ok(_) => emit(&json!({ "valid": true, "violations": [] })),
                Err(e) => {
                    emit(&json!({ "valid": false, "violations": e.violations }));
                    ExitCode::from(2)
                }
            }
        }

        Commands::Watch { debounce_ms } => watch(&cli.assets_dir, library, *debounce_ms),
    }
}

fn populate_markup(path: &Path, content: &folio_core::ContentInstance) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => return fail(&format!("Failed to read {}: {}", path.display(), e)),
    };
    let populated = DataBinder::markup().populate(&source, content);
    emit(&json!({ "success": true, "markup": populated }))
}

fn watch(root: &Path, mut library: AssetLibrary, debounce_ms: u64) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => return fail(&format!("Failed to start runtime: {}", e)),
    };
    runtime.block_on(async move {
        let mut watcher = match AssetWatcher::new(root, WatchConfig { debounce_ms }) {
            Ok(watcher) => watcher,
            Err(e) => return fail(&e.to_string()),
        };
        while let Some(change) = watcher.recv().await {
            if let Err(e) = folio_core::apply_change(&mut library, watcher.root(), &change) {
                tracing::warn!(error = %e, "Failed to apply asset change");
                continue;
            }
            if let Some(matrix) = library.cached_matrix() {
                println!(
                    "{}",
                    json!({
                        "change": format!("{:?}", change),
                        "fingerprint": matrix.fingerprint,
                        "pairs": matrix.len(),
                        "compatiblePairs": matrix.compatible_pairs().count(),
                    })
                );
            }
        }
        ExitCode::SUCCESS
    })
}
