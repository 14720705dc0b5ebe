use alphabeta_chess::*;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Alpha-beta chess engine", long_about = None)]
struct Cli {
    /// TOML file with engine and server settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Transposition table size in megabytes (overrides the config file)
    #[arg(long, global = true)]
    hash: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the JSON HTTP server
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },
    /// Search a position and print the chosen move as JSON
    Bestmove {
        #[arg(long, default_value = START_FEN)]
        fen: String,
        #[arg(short, long)]
        depth: Option<u8>,
        /// Stop deepening after this many milliseconds
        #[arg(long)]
        movetime: Option<u64>,
    },
    /// Print static facts about a position as JSON
    Analyze {
        #[arg(long, default_value = START_FEN)]
        fen: String,
    },
    /// Count leaf nodes of the move tree
    Perft {
        #[arg(long, default_value = START_FEN)]
        fen: String,
        #[arg(short, long, default_value_t = 4)]
        depth: u32,
    },
    /// Let the search bot play the random bot
    Selfplay {
        #[arg(long, default_value = START_FEN)]
        fen: String,
        /// Seconds per move
        #[arg(long, default_value_t = 2)]
        time: u64,
        #[arg(long, default_value_t = 200)]
        max_moves: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = EngineConfig::load_or_default(cli.config.as_deref())?;
    if let Some(hash) = cli.hash {
        config.hash_mb = hash;
    }
    config.validate()?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            web::run_server(config)
                .await
                .map_err(|e| anyhow!(e))
                .context("web server failed")?;
        }
        Command::Bestmove { fen, depth, movetime } => {
            let depth = config.clamp_depth(depth);
            let limits = match movetime {
                Some(ms) => SearchLimits::timed(depth, Duration::from_millis(ms)),
                None => SearchLimits::depth(depth),
            };
            let mut engine = config.build_engine();
            let outcome = api::best_move_with_limits(&mut engine, &fen, limits)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Analyze { fen } => {
            let analysis = api::analyze(&fen)?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Command::Perft { fen, depth } => {
            let mut state = GameState::from_fen(&fen)?;
            let start = Instant::now();
            let nodes = perft(&mut state, depth);
            let elapsed = start.elapsed();
            println!("perft({}) = {} in {:.2?}", depth, nodes, elapsed);
        }
        Command::Selfplay {
            fen,
            time,
            max_moves,
            seed,
        } => {
            let state = GameState::from_fen(&fen)?;
            let search = Box::new(SearchBot::new(
                "SearchBot".to_string(),
                config.build_engine(),
                config.default_depth,
            ));
            let random = Box::new(RandomBot::new("RandomBot".to_string(), seed));
            let match_config = MatchConfig {
                time_per_move: Duration::from_secs(time),
                max_moves,
            };
            let mut game = Match::from_position(search, random, match_config, state);
            let result = game.play();

            println!("{}", game.state().display_board());
            match result {
                MatchResult::Win {
                    winner_name,
                    color,
                    moves,
                } => println!("{} wins as {} in {} plies", winner_name, color.name(), moves),
                MatchResult::Draw { moves, reason } => println!("Draw after {} plies ({})", moves, reason),
                MatchResult::Timeout { violator, winner } => {
                    println!("{} wins on time (opponent: {})", winner, violator)
                }
                MatchResult::IllegalMove { violator, winner } => {
                    println!("{} wins by forfeit (opponent: {})", winner, violator)
                }
            }
            let moves: Vec<String> = game.moves().iter().map(|m| m.uci()).collect();
            println!("{}", moves.join(" "));
        }
    }
    Ok(())
}
