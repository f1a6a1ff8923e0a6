/// Trainer: interactive terminal session with a generated visitor.
///
/// Usage: trainer [--difficulty <tier>] [--class <name>] [--student <name>]
///                [--seed <n>] [--lexicon <path>] [--config <path>]
///                [--export <dir>] [--tts] [--verbose]
///
/// Anything not starting with '/' is said to the visitor.
///
/// Commands:
///   /hint              show the hint for the current step
///   /briefing <text>   write the supervisor briefing (5W)
///   /status            show step progress
///   /revealed          show what the visitor has told you
///   /card              show the ID card as revealed so far
///   /feedback          show feedback for the run so far
///   /export [dir]      write the CSV export (finished runs only)
///   /csv               print the export document
///   /new [seed]        start a new run
///   /difficulty <tier> switch tier for the rest of the run
///   /tts               toggle reading replies aloud
///   /help              list commands
///   /quit              exit

use clap::Parser;
use entry_trainer::core::export::{render_csv, write_export, ExportError};
use entry_trainer::core::feedback::Feedback;
use entry_trainer::core::session::{StepProgress, TrainerSession, TurnOutcome};
use entry_trainer::core::speech::{SpeechError, TextToSpeech};
use entry_trainer::schema::difficulty::Difficulty;
use entry_trainer::TrainerConfig;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Entry-control role-play trainer
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Difficulty tier: basic, standard or advanced
    #[arg(short, long)]
    difficulty: Option<Difficulty>,

    /// Class identifier used in the export
    #[arg(long = "class")]
    class_name: Option<String>,

    /// Student identifier used in the export
    #[arg(long = "student")]
    student_name: Option<String>,

    /// Seed for the first visitor
    #[arg(short, long)]
    seed: Option<u64>,

    /// Phrasebook document (.ron or .json)
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Trainer config file (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to write the export into when the run finishes
    #[arg(long)]
    export: Option<PathBuf>,

    /// Read visitor replies aloud (console stand-in)
    #[arg(long)]
    tts: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Prints replies as they would be spoken.
struct ConsoleSpeaker;

impl TextToSpeech for ConsoleSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        println!("  (speaking) {}", text);
        Ok(())
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match args.config {
        Some(ref path) => TrainerConfig::load_or_default(path),
        None => TrainerConfig::default(),
    };
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(ref class) = args.class_name {
        config.class_name = class.clone();
    }
    if let Some(ref student) = args.student_name {
        config.student_name = student.clone();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.lexicon.is_some() {
        config.lexicon_path = args.lexicon.clone();
    }
    if args.export.is_some() {
        config.export_dir = args.export.clone();
    }
    config.text_to_speech |= args.tts;

    let mut session = match config.session_builder().text_to_speech(ConsoleSpeaker).build() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };
    if config.seed.is_none() {
        session.new_run();
    }
    if config.voice_input {
        warn!("voice input needs a speech recogniser, falling back to typed input");
    }

    print_banner(&session);
    print_new_lines(&session, 0);
    session.speak_latest();

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    loop {
        print!("you> ");
        let _ = io::stdout().flush();

        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("ERROR: {}", e);
                break;
            }
        }

        let input = line.trim();
        if let Some(command) = input.strip_prefix('/') {
            let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
            match name {
                "quit" | "exit" => break,
                "help" => print_help(),
                "hint" => println!("Hint: {}", session.current_step().hint),
                "briefing" => {
                    session.set_briefing(rest);
                    if session.briefing_complete() {
                        println!("Briefing saved.");
                    } else {
                        println!("Briefing saved, but it is too short to count yet.");
                    }
                }
                "status" => print_status(&session),
                "revealed" => print_revealed(&session),
                "card" => print!("{}", session.id_card()),
                "feedback" => print!("{}", Feedback::from_session(&session)),
                "export" => {
                    let dir = match rest.trim() {
                        "" => config.export_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
                        dir => PathBuf::from(dir),
                    };
                    export(&session, &dir);
                }
                "csv" => print!("{}", render_csv(&session)),
                "new" => {
                    match rest.trim().parse::<u64>() {
                        Ok(seed) => session.reset(seed),
                        Err(_) => {
                            session.new_run();
                        }
                    }
                    print_banner(&session);
                    print_new_lines(&session, 0);
                    session.speak_latest();
                }
                "difficulty" => match rest.trim().parse::<Difficulty>() {
                    Ok(difficulty) => {
                        session.set_difficulty(difficulty);
                        println!("Difficulty: {} ({})", difficulty, difficulty.notes());
                    }
                    Err(e) => println!("{}", e),
                },
                "tts" => {
                    let enabled = !session.tts_enabled();
                    session.set_tts_enabled(enabled);
                    println!("Reading aloud {}.", if enabled { "on" } else { "off" });
                }
                other => println!("Unknown command: /{} (try /help)", other),
            }
            continue;
        }

        let before = session.transcript().len();
        match session.submit(input) {
            TurnOutcome::Ignored => continue,
            TurnOutcome::NoSpeech { prompt } => println!("{}", prompt),
            TurnOutcome::Answered(turn) => {
                // skip the learner's own line
                print_new_lines(&session, before + 1);
                session.speak_latest();
                match turn.progress {
                    StepProgress::Advanced { .. } => {
                        println!("\n== {} ==", session.current_step().title);
                    }
                    StepProgress::Finished => {
                        println!();
                        print!("{}", Feedback::from_session(&session));
                        if let Some(ref dir) = config.export_dir {
                            export(&session, dir);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(io::stderr)
        .init();
}

fn print_banner(session: &TrainerSession) {
    println!();
    println!("=== Entry control trainer ({}) ===", session.run_id());
    println!(
        "Difficulty: {} ({})",
        session.difficulty(),
        session.difficulty().notes()
    );
    println!("Type /help for commands.\n");
    println!("== {} ==", session.current_step().title);
}

fn print_new_lines(session: &TrainerSession, from: usize) {
    for entry in session.transcript().entries().iter().skip(from) {
        println!("{:>8}: {}", entry.speaker.tag(), entry.text);
    }
}

fn print_status(session: &TrainerSession) {
    let (done, total) = session.completed_counts();
    println!(
        "Seed {}, {} difficulty. Completed {}/{} items.",
        session.seed(),
        session.difficulty(),
        done,
        total
    );
    for (i, step) in session.steps().iter().enumerate() {
        let marker = if i == session.step_index() && !session.is_finished() {
            ">"
        } else {
            " "
        };
        println!("{} {}", marker, step.title);
        for intent in &step.required {
            let check = if session.is_satisfied(intent) { "x" } else { " " };
            println!("    [{}] {}", check, intent);
        }
    }
    if session.current_step().requires_briefing && !session.briefing_complete() {
        println!("Briefing: missing (use /briefing <text>)");
    }
}

fn print_revealed(session: &TrainerSession) {
    let revealed = session.revealed();
    if revealed.is_empty() {
        println!("Nothing revealed yet.");
        return;
    }
    for (label, value) in revealed.summary() {
        println!("  {:<8}{}", label, value);
    }
    if revealed.id.is_some() {
        println!("  ID card shown (use /card).");
    }
}

fn export(session: &TrainerSession, dir: &Path) {
    match write_export(session, dir) {
        Ok(path) => println!("Export written to {}", path.display()),
        Err(ExportError::NotReady(_)) => println!("Export is available once all steps are complete."),
        Err(e) => eprintln!("ERROR: {}", e),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /hint              show the hint for the current step");
    println!("  /briefing <text>   write the supervisor briefing (5W)");
    println!("  /status            show step progress");
    println!("  /revealed          show what the visitor has told you");
    println!("  /card              show the ID card as revealed so far");
    println!("  /feedback          show feedback for the run so far");
    println!("  /export [dir]      write the CSV export (finished runs only)");
    println!("  /csv               print the export document");
    println!("  /new [seed]        start a new run");
    println!("  /difficulty <tier> switch tier for the rest of the run");
    println!("  /tts               toggle reading replies aloud");
    println!("  /quit              exit");
}
