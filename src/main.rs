use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use streak_oracle::config::OracleConfig;
use streak_oracle::engine::PredictionEngine;
use streak_oracle::patterns::PatternTable;
use streak_oracle::{output, Oracle};

#[derive(Parser)]
#[command(name = "streak-oracle")]
#[command(about = "Inspect round histories and pattern-table predictions")]
struct Cli {
    /// Path to the YAML config (default: $ORACLE_CONFIG_PATH or config/oracle.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stored history and current prediction for each game
    Show {
        /// Only this game
        #[arg(short, long)]
        game: Option<String>,
    },

    /// Run the prediction engine on an ad-hoc history string
    Predict {
        /// Game whose pattern table is used
        #[arg(short, long)]
        game: String,

        /// History in alphabet characters, oldest first (e.g. TTXTX)
        #[arg(long)]
        history: String,
    },

    /// Classify a raw result label
    Classify {
        label: String,
    },

    /// List a game's pattern rules in match order
    Patterns {
        #[arg(short, long)]
        game: String,
    },

    /// Export snapshots of all games
    Export {
        /// Output directory for generated files
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(|| {
        PathBuf::from(
            std::env::var("ORACLE_CONFIG_PATH").unwrap_or_else(|_| "config/oracle.yaml".to_string()),
        )
    });
    let config = OracleConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    match cli.command {
        Commands::Show { game } => show(&config, game.as_deref())?,
        Commands::Predict { game, history } => predict(&config, &game, &history)?,
        Commands::Classify { label } => classify(&config, &label),
        Commands::Patterns { game } => patterns(&config, &game)?,
        Commands::Export { output_dir } => export(&config, output_dir)?,
    }

    Ok(())
}

fn show(config: &OracleConfig, game: Option<&str>) -> Result<()> {
    let oracle = Oracle::from_config(config)?;
    let snapshots = match game {
        Some(g) => vec![oracle.snapshot(g)?],
        None => oracle.snapshots()?,
    };
    println!("{}", output::snapshot_table(&snapshots));
    Ok(())
}

fn predict(config: &OracleConfig, game: &str, history: &str) -> Result<()> {
    let Some(game_config) = config.game(game) else {
        bail!("Unknown game: {}", game);
    };
    let Some(symbols) = config.alphabet.parse(history.trim()) else {
        bail!(
            "History may only contain '{}' and '{}'",
            config.alphabet.a,
            config.alphabet.b
        );
    };

    let table = PatternTable::load(&game_config.patterns, &config.alphabet);
    let engine = PredictionEngine::new(config.prediction.clone(), config.alphabet);
    let prediction = engine.predict(&symbols, &table);

    println!("🎲 Game:        {}", game);
    println!("📜 History:     {}", config.alphabet.render(&symbols));
    println!("🔮 Prediction:  {}", prediction.label);
    println!("📊 Confidence:  {}%", prediction.confidence);
    match prediction.pattern {
        Some(pattern) => println!("🧩 Matched:     {} ({} symbols)", pattern, prediction.matched_length),
        None => println!("🧩 Matched:     none"),
    }
    Ok(())
}

fn classify(config: &OracleConfig, label: &str) {
    let classifier =
        streak_oracle::classifier::RoundClassifier::new(config.classifier.small_keywords.iter().cloned());
    let symbol = classifier.classify(label);
    println!("{:?} -> {:?} ({})", label, symbol, config.alphabet.encode(symbol));
}

fn patterns(config: &OracleConfig, game: &str) -> Result<()> {
    let Some(game_config) = config.game(game) else {
        bail!("Unknown game: {}", game);
    };
    let table = PatternTable::load(&game_config.patterns, &config.alphabet);
    if table.is_empty() {
        println!("⚠️  No patterns loaded for {} ({})", game, game_config.patterns.display());
        return Ok(());
    }
    println!("{}", output::pattern_table(&table, &config.alphabet));
    println!("{} rules, longest {}", table.len(), table.max_pattern_len());
    Ok(())
}

fn export(config: &OracleConfig, output_dir: PathBuf) -> Result<()> {
    let oracle = Oracle::from_config(config)?;
    let snapshots = oracle.snapshots()?;

    std::fs::create_dir_all(&output_dir)?;
    let json_path = output_dir.join("snapshots.json");
    let csv_path = output_dir.join("snapshots.csv");

    println!("💾 Exporting {} snapshots...", snapshots.len());

    output::export_to_json(&snapshots, &json_path)?;
    println!("  ✅ JSON: {}", json_path.display());

    output::export_to_csv(&snapshots, &csv_path)?;
    println!("  ✅ CSV: {}", csv_path.display());

    Ok(())
}
