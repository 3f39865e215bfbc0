use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use coach_core::journal::{read_completions, AdjustmentRecord};
use coach_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "coach")]
#[command(about = "Training prescription normalization and adjustment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a raw prescription document and store it as the draft
    Normalize {
        /// Path to a JSON prescription file
        file: PathBuf,

        /// Session identifier for the draft
        #[arg(long, default_value = "local")]
        session: String,

        /// Show the normalized result without storing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Adjust the draft's endurance intensity
    Adjust {
        /// Direction of the adjustment
        #[arg(long, value_enum)]
        direction: Direction,
    },

    /// Show the current draft (default)
    Show,

    /// Mark the draft as completed and append it to the journal
    Complete {
        /// Perceived RPE for the session (1-10)
        #[arg(long)]
        rpe: Option<u8>,
    },

    /// List completed sessions from the journal
    History {
        /// Maximum number of sessions to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Easier,
    Harder,
}

impl From<Direction> for AdjustmentDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Easier => AdjustmentDirection::Easier,
            Direction::Harder => AdjustmentDirection::Harder,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    coach_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Normalize {
            file,
            session,
            dry_run,
        }) => cmd_normalize(data_dir, file, session, dry_run),
        Some(Commands::Adjust { direction }) => cmd_adjust(data_dir, direction.into()),
        Some(Commands::Complete { rpe }) => cmd_complete(data_dir, rpe),
        Some(Commands::History { limit }) => cmd_history(data_dir, limit),
        Some(Commands::Show) | None => cmd_show(data_dir),
    }
}

fn draft_path(data_dir: &Path) -> PathBuf {
    data_dir.join("draft.json")
}

fn journal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("journal.jsonl")
}

fn cmd_normalize(data_dir: PathBuf, file: PathBuf, session: String, dry_run: bool) -> Result<()> {
    let contents = std::fs::read_to_string(&file)?;
    let raw: serde_json::Value = serde_json::from_str(&contents)?;

    let prescription = normalize_prescription(&raw);
    display_prescription(&prescription);

    if prescription.shape == PrescriptionShape::Unknown {
        println!("\n⚠ Document matched no known prescription shape.");
    }

    if dry_run {
        println!("\n[Dry run - draft not updated]");
        return Ok(());
    }

    PrescriptionDraft::update(&draft_path(&data_dir), |draft| {
        draft.set_prescription(prescription.clone(), &session);
        Ok(())
    })?;

    println!("\n✓ Draft stored for session '{}'", session);
    Ok(())
}

fn cmd_adjust(data_dir: PathBuf, direction: AdjustmentDirection) -> Result<()> {
    let draft_path = draft_path(&data_dir);
    let mut draft = PrescriptionDraft::load(&draft_path)?;

    let Some(prescription) = draft.prescription.clone() else {
        println!("No draft to adjust. Run `coach normalize <file>` first.");
        return Ok(());
    };

    let result = adjust_endurance_intensity(&prescription, direction);
    println!("{}", result.message);

    if !result.success {
        return Ok(());
    }

    for change in &result.changes {
        println!(
            "  {} / {}: {} -> {}",
            change.block_name, change.field, change.old_value, change.new_value
        );
    }

    let mut journal = JsonlJournal::new(journal_path(&data_dir));
    journal.append(&JournalEntry::Adjustment(AdjustmentRecord {
        id: uuid::Uuid::new_v4(),
        session_name: result.adjusted_prescription.session_name.clone(),
        direction,
        recorded_at: Utc::now(),
        changes: result.changes.clone(),
    }))?;

    draft.record_adjustment(result.adjusted_prescription);
    draft.save(&draft_path)?;

    println!("\n✓ Draft updated ({} change(s))", result.changes.len());
    Ok(())
}

fn cmd_show(data_dir: PathBuf) -> Result<()> {
    let draft = PrescriptionDraft::load(&draft_path(&data_dir))?;

    match draft.prescription {
        Some(ref prescription) => {
            display_prescription(prescription);
            if draft.adjustment_count > 0 {
                println!("  Adjusted {} time(s)", draft.adjustment_count);
            }
        }
        None => println!("No draft. Run `coach normalize <file>` to create one."),
    }

    Ok(())
}

fn cmd_complete(data_dir: PathBuf, rpe: Option<u8>) -> Result<()> {
    let draft_path = draft_path(&data_dir);
    let mut draft = PrescriptionDraft::load(&draft_path)?;

    let Some(prescription) = draft.prescription.take() else {
        println!("No draft to complete.");
        return Ok(());
    };

    let session = CompletedSession {
        id: uuid::Uuid::new_v4(),
        session_name: prescription.session_name.clone(),
        shape: prescription.shape,
        discipline: prescription.discipline.clone(),
        completed_at: Utc::now(),
        duration_target: prescription.duration_target,
        exercise_count: workout_items_count(&prescription),
        perceived_rpe: rpe,
    };

    let mut journal = JsonlJournal::new(journal_path(&data_dir));
    journal.append(&JournalEntry::Completion(session))?;

    draft.clear();
    draft.save(&draft_path)?;

    println!("✓ Session logged!");
    Ok(())
}

fn cmd_history(data_dir: PathBuf, limit: usize) -> Result<()> {
    let completions = read_completions(&journal_path(&data_dir))?;

    if completions.is_empty() {
        println!("No completed sessions yet.");
        return Ok(());
    }

    println!("Last {} session(s):", limit.min(completions.len()));
    for session in completions.iter().rev().take(limit) {
        println!(
            "  {}  {:<30}  {:?}  {}{}",
            session.completed_at.format("%Y-%m-%d %H:%M"),
            session.session_name.as_deref().unwrap_or("(unnamed)"),
            session.shape,
            session.discipline.as_deref().unwrap_or("-"),
            session
                .perceived_rpe
                .map(|r| format!("  RPE {}", r))
                .unwrap_or_default()
        );
    }

    Ok(())
}

fn display_prescription(prescription: &CanonicalPrescription) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {:?} SESSION", prescription.shape);
    println!("╰─────────────────────────────────────────╯");
    println!();

    if let Some(ref name) = prescription.session_name {
        println!("  {}", name);
    }
    if let Some(ref discipline) = prescription.discipline {
        println!("  Discipline: {}", discipline);
    }
    if let Some(duration) = prescription.duration_target {
        println!("  Duration: ~{} min", duration);
    }
    if !prescription.focus.is_empty() {
        println!("  Focus: {}", prescription.focus.join(", "));
    }
    println!();

    if let Some(blocks) = prescription.main_workout.as_deref() {
        for block in blocks {
            let zone = block.target_zone.as_deref().unwrap_or("-");
            match block.intervals {
                Some(ref intervals) => println!(
                    "  → {} ({} min, {}): {}x {}min on / {}min off",
                    block.name,
                    block.duration,
                    zone,
                    intervals.repeats,
                    intervals.work.duration,
                    intervals.rest.duration
                ),
                None => println!("  → {} ({} min, {})", block.name, block.duration, zone),
            }
        }
    } else {
        for exercise in &prescription.exercises {
            println!(
                "  → {}: {}x{} (rest {}s)",
                exercise.name, exercise.sets, exercise.reps, exercise.rest
            );
        }
    }

    println!();
}
