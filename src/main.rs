//! Civ Council - headless runner
//!
//! Creates a game, plays it turn by turn with the local heuristic or an LLM
//! policy, prints each turn's narration and optionally writes the final
//! state as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use civ_council::core::config::GameConfig;
use civ_council::core::error::Result;
use civ_council::llm::LlmClient;
use civ_council::policy::{LlmPolicy, LocalPolicy, PolicyProvider};
use civ_council::rules::Ruleset;
use civ_council::state::game::CivGameState;
use civ_council::store::{GameService, InMemoryStore};
use civ_council::turn::{advance_turn_local, PhaseEvent};
use civ_council::world::create_game;

/// Play a civ-council game from the command line
#[derive(Parser, Debug)]
#[command(name = "civ-council")]
#[command(about = "Run a turn-based multi-civilization game")]
struct Args {
    /// Random seed for the world and every roll
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Turns to play before stopping (the game may end earlier)
    #[arg(long, default_value_t = 50)]
    turns: u32,

    /// Turn limit for score victory; defaults to the config value
    #[arg(long)]
    max_turns: Option<u32>,

    /// Map side length in tiles; defaults to the config value
    #[arg(long)]
    grid_size: Option<usize>,

    /// Game configuration TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ruleset TOML
    #[arg(long)]
    ruleset: Option<PathBuf>,

    /// Use the LLM policy (needs LLM_API_KEY)
    #[arg(long)]
    llm: bool,

    /// Run synchronously with the built-in planner
    #[arg(long, conflicts_with = "llm")]
    sync: bool,

    /// Write the final state as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("civ_council=info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::load_default()?,
    };
    let rules = Arc::new(match &args.ruleset {
        Some(path) => Ruleset::load(path)?,
        None => Ruleset::load_default()?,
    });
    let max_turns = args.max_turns.unwrap_or(config.world.default_max_turns);
    let grid_size = args.grid_size.unwrap_or(config.world.default_grid_size);

    let state = if args.sync {
        run_sync(&args, &config, &rules, max_turns, grid_size)?
    } else {
        let rt = Runtime::new()?;
        rt.block_on(run_async(&args, config, rules, max_turns, grid_size))?
    };

    print_summary(&state);
    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&state)?)?;
        tracing::info!(path = %path.display(), "final state written");
    }
    Ok(())
}

fn run_sync(
    args: &Args,
    config: &GameConfig,
    rules: &Ruleset,
    max_turns: u32,
    grid_size: usize,
) -> Result<CivGameState> {
    let mut state = create_game(args.seed, max_turns, grid_size, config, rules)?;
    for _ in 0..args.turns {
        if state.is_over() {
            break;
        }
        advance_turn_local(&mut state, rules)?;
        println!("{}\n", state.narration);
    }
    Ok(state)
}

async fn run_async(
    args: &Args,
    config: GameConfig,
    rules: Arc<Ruleset>,
    max_turns: u32,
    grid_size: usize,
) -> Result<CivGameState> {
    let policy: Arc<dyn PolicyProvider> = if args.llm {
        let client = LlmClient::from_env()?.with_max_tokens(config.policy.llm_max_tokens);
        tracing::info!(model = client.model(), "using LLM policy");
        Arc::new(LlmPolicy::new(client, rules.clone(), config.policy.clone()))
    } else {
        Arc::new(LocalPolicy::new(rules.clone()))
    };

    let service = GameService::new(Arc::new(InMemoryStore::new()), rules, config);
    let handle = service.create_game(args.seed, max_turns, grid_size).await?;
    let orchestrator = service.orchestrator(policy);

    let mut updates = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            if update.event == PhaseEvent::NarrationComplete {
                println!("{}\n", update.data.narration);
            }
        }
    });

    for _ in 0..args.turns {
        if handle.snapshot().await.is_over() {
            break;
        }
        orchestrator.advance_turn(&handle).await?;
    }

    let state = handle.snapshot().await;
    drop(service);
    drop(handle);
    // The channel closes once the last sender is gone
    let _ = printer.await;
    Ok(state)
}

fn print_summary(state: &CivGameState) {
    println!("=== After turn {} ===", state.turn.saturating_sub(1));
    for id in &state.civ_order {
        if let Some(civ) = state.civilizations.get(id) {
            println!(
                "{:<10} score {:>4}  cities {:>2}  units {:>2}  techs {:>2}  gold {:>5}{}",
                civ.name,
                civ.score,
                civ.cities.len(),
                civ.units.len(),
                civ.research.researched.len(),
                civ.gold,
                if civ.alive { "" } else { "  (eliminated)" }
            );
        }
    }
    match (&state.winner, state.victory_type) {
        (Some(winner), Some(kind)) => println!("Winner: {} ({:?} victory)", winner, kind),
        _ => println!("No winner yet"),
    }
}
