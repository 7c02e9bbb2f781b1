use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Deserialize;
use shared::{AlignedStructure, ChainId, Column, LigandSite, ResidueId, RowIndex, SyncAction, Variant, make_chain_key};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sync_engine::dataflow::relay;
use sync_engine::{
    BINDING_SITE_PRIORITY, LoggingMsaAdapter, LoggingStructureAdapter, MUTATION_PRIORITY, PositionMapper, SyncConfig,
    SyncDispatcher, SyncEvent, load_config,
};

#[derive(Parser)]
#[command(name = "sync_replay")]
#[command(about = "Replay scripted view-sync actions against logging adapters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and log every adapter call
    Run {
        scenario: PathBuf,

        /// Dispatcher settings (TOML); defaults when omitted
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Parse a scenario and print what it contains
    Check { scenario: PathBuf },
}

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    context: Option<ContextSection>,
    #[serde(default)]
    aligned: Vec<AlignedSection>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct ContextSection {
    chain_id: ChainId,
    /// `[column, residue]` pairs
    mapping: Vec<(Column, ResidueId)>,
}

#[derive(Debug, Deserialize)]
struct AlignedSection {
    #[serde(flatten)]
    structure: AlignedStructure,
    mapping: Vec<(Column, ResidueId)>,
}

#[derive(Debug, Clone, Deserialize)]
struct Step {
    /// Pause before this step
    #[serde(default)]
    wait_ms: u64,
    #[serde(default)]
    action: Option<SyncAction>,
    /// `[start, end]` of the grid's visible columns
    #[serde(default)]
    viewport: Option<(Column, Column)>,
    #[serde(default)]
    ligand_site: Option<LigandSiteStep>,
    #[serde(default)]
    variants: Option<VariantsStep>,
    /// Id of a rule to bring into view
    #[serde(default)]
    focus_rule: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LigandSiteStep {
    #[serde(flatten)]
    site: LigandSite,
    row: RowIndex,
    #[serde(default = "binding_site_priority")]
    priority: i32,
}

/// Variants of the active chain in `structure`.
#[derive(Debug, Clone, Deserialize)]
struct VariantsStep {
    structure: String,
    row: RowIndex,
    #[serde(default = "mutation_priority")]
    priority: i32,
    entries: Vec<Variant>,
}

fn binding_site_priority() -> i32 {
    BINDING_SITE_PRIORITY
}

fn mutation_priority() -> i32 {
    MUTATION_PRIORITY
}

#[derive(Debug, Clone)]
enum ReplayEvent {
    Action(SyncAction),
    Viewport(Column, Column),
    LigandSite(LigandSiteStep),
    Variants(VariantsStep),
    FocusRule(String),
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;

    let scenario: Scenario = toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file: {}", path.display()))?;

    Ok(scenario)
}

async fn run(scenario: Scenario, config: SyncConfig) -> Result<()> {
    let settle_time = config.repaint_debounce() + config.window_debounce() + Duration::from_millis(100);
    let (dispatcher, mut sync_events) = SyncDispatcher::with_events(config);
    dispatcher.attach_msa_adapter(Arc::new(LoggingMsaAdapter));
    dispatcher.attach_structure_adapter(Arc::new(LoggingStructureAdapter::new("primary")));

    if let Some(context) = scenario.context {
        dispatcher.set_context(context.chain_id, PositionMapper::from_pairs(context.mapping));
    }
    for aligned in scenario.aligned {
        let id = aligned.structure.id.clone();
        dispatcher.add_aligned_structure(aligned.structure, PositionMapper::from_pairs(aligned.mapping));
        dispatcher.attach_aligned_adapter(&id, Arc::new(LoggingStructureAdapter::new(id.clone())));
    }

    let (step_replayed_relay, mut step_replayed_stream) = relay::<ReplayEvent>();
    let steps = scenario.steps;
    tokio::spawn(async move {
        for step in steps {
            if step.wait_ms > 0 {
                tokio::time::sleep(Duration::from_millis(step.wait_ms)).await;
            }
            if let Some(action) = step.action {
                step_replayed_relay.send(ReplayEvent::Action(action));
            }
            if let Some((start, end)) = step.viewport {
                step_replayed_relay.send(ReplayEvent::Viewport(start, end));
            }
            if let Some(ligand_site) = step.ligand_site {
                step_replayed_relay.send(ReplayEvent::LigandSite(ligand_site));
            }
            if let Some(variants) = step.variants {
                step_replayed_relay.send(ReplayEvent::Variants(variants));
            }
            if let Some(id) = step.focus_rule {
                step_replayed_relay.send(ReplayEvent::FocusRule(id));
            }
        }
    });

    while let Some(event) = step_replayed_stream.next().await {
        match event {
            ReplayEvent::Action(action) => {
                log::info!("> {}", action.name());
                dispatcher.dispatch(action);
            }
            ReplayEvent::Viewport(start, end) => {
                log::info!("> viewport {}..={}", start, end);
                dispatcher.set_viewport(start, end);
            }
            ReplayEvent::LigandSite(step) => {
                log::info!("> ligand site {}", step.site.id);
                dispatcher.add_ligand_site(&step.site, step.row, step.priority);
            }
            ReplayEvent::Variants(step) => match dispatcher.active_chain_id() {
                Some(chain_id) => {
                    let chain_key = make_chain_key(&step.structure, &chain_id);
                    let added = dispatcher.add_variants(&chain_key, step.row, &step.entries, step.priority);
                    log::info!("> {} variants of {}", added, chain_key);
                }
                None => log::warn!("> variants of {} skipped: no active chain", step.structure),
            },
            ReplayEvent::FocusRule(id) => {
                log::info!("> focus {}", id);
                if !dispatcher.focus_rule(&id) {
                    log::warn!("> no rule '{}' to focus", id);
                }
            }
        }
    }

    tokio::time::sleep(settle_time).await;
    while dispatcher.is_repaint_in_flight() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut repaint_cycles = 0;
    let mut failures = 0;
    while let Some(Some(event)) = futures::FutureExt::now_or_never(sync_events.next()) {
        if let SyncEvent::RepaintCycleCompleted { failures: failed } = event {
            repaint_cycles += 1;
            failures += failed;
        }
    }

    let state = dispatcher.color_state();
    let paint = dispatcher.resolved_paint();
    log::info!(
        "done: {} rules, {} painted columns, {} painted cells, {} repaint cycles ({} failed repaints)",
        state.rules.len(),
        paint.column_colors.len(),
        paint.cell_colors.len(),
        repaint_cycles,
        failures
    );
    Ok(())
}

fn check(scenario: &Scenario) {
    match &scenario.context {
        Some(context) => println!(
            "context: chain {} with {} mapped columns",
            context.chain_id,
            context.mapping.len()
        ),
        None => println!("context: none"),
    }
    for aligned in &scenario.aligned {
        println!(
            "aligned: {} ({} chain {}) with {} mapped columns",
            aligned.structure.id,
            aligned.structure.source_structure,
            aligned.structure.source_chain,
            aligned.mapping.len()
        );
    }
    for (index, step) in scenario.steps.iter().enumerate() {
        let action = step.action.as_ref().map_or("-", SyncAction::name);
        println!("step {}: +{}ms {} {:?}", index, step.wait_ms, action, step.viewport);
        if let Some(ligand_site) = &step.ligand_site {
            println!("  ligand site {} ({} residues)", ligand_site.site.id, ligand_site.site.neighborhood.len());
        }
        if let Some(variants) = &step.variants {
            println!("  {} variants of {}", variants.entries.len(), variants.structure);
        }
        if let Some(id) = &step.focus_rule {
            println!("  focus {}", id);
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { scenario, config } => {
            let config = match config {
                Some(path) => load_config(&path),
                None => Ok(SyncConfig::default()),
            };
            match (load_scenario(&scenario), config) {
                (Ok(scenario), Ok(config)) => run(scenario, config).await,
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        Commands::Check { scenario } => load_scenario(&scenario).map(|scenario| check(&scenario)),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }
}
