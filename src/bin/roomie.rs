//! Command-line demo: seed an in-memory store from a JSON file, build the
//! ranked pool for one user and optionally apply a series of swipes.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use roomie_match::{
    InMemoryProfileStore, MatchSession, RoomieConfig, ScoredCandidate, SwipeAction, SwipeStatus,
    TracingErrorReporter,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "roomie", about = "Rank and swipe roommate candidates")]
struct Args {
    /// JSON array of profile documents.
    #[arg(long)]
    profiles: PathBuf,

    /// Id of the user browsing the pool.
    #[arg(long)]
    user: String,

    /// Optional YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Swipes to apply in order, e.g. `--swipe like --swipe pass`.
    #[arg(long = "swipe", value_parser = parse_action)]
    swipes: Vec<SwipeAction>,
}

fn parse_action(raw: &str) -> Result<SwipeAction, String> {
    raw.parse()
}

fn init_tracing(config: &RoomieConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_candidate(rank: usize, candidate: &ScoredCandidate) {
    let profile = &candidate.profile;
    println!(
        "{rank:>2}. {name} ({id}) {score}%",
        name = profile.name,
        id = profile.id,
        score = candidate.compatibility
    );
    let vibe = profile
        .lifestyle
        .social_vibe
        .as_ref()
        .map(|vibe| vibe.label())
        .unwrap_or("Unspecified");
    println!(
        "    sleep: {} | cleanliness: {} | vibe: {}",
        profile.sleep_label(),
        profile.cleanliness_label(),
        vibe
    );
    for insight in &candidate.compatibility_insights {
        println!("    {} {}", insight.icon, insight.text);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RoomieConfig::from_file(path)?,
        None => RoomieConfig::default(),
    };
    init_tracing(&config);

    let bytes = std::fs::read(&args.profiles)?;
    let store = Arc::new(InMemoryProfileStore::from_json_slice(&bytes)?);
    let me = store
        .snapshot(&args.user)?
        .ok_or_else(|| format!("no profile with id {}", args.user))?;

    let session = MatchSession::new(
        store.clone(),
        Arc::new(TracingErrorReporter),
        config.session_config(),
    );
    let size = session.rebuild(&me).await?;
    println!("{size} candidate(s) for {}", me.name);

    for (rank, candidate) in session.candidates().await.iter().enumerate() {
        print_candidate(rank + 1, candidate);
    }

    for action in args.swipes {
        let Some(candidate) = session.current_candidate().await else {
            println!("pool exhausted");
            break;
        };
        let outcome = session.swipe(&me, candidate.id(), action).await?;
        println!(
            "{action} {} -> {:?} ({} left)",
            outcome.candidate_id, outcome.status, outcome.remaining
        );
        if outcome.status == SwipeStatus::Matched {
            if let Some(matched) = session.dismiss_celebration().await {
                println!("It's a match with {}!", matched.name);
            }
        }
    }

    if let Some(updated) = store.snapshot(&me.id)? {
        println!(
            "likes={:?} passes={:?} superLikes={:?} matches={:?}",
            updated.likes, updated.passes, updated.super_likes, updated.matches
        );
    }
    Ok(())
}
