// src/main.rs - Live session on the simulated feed, steered from stdin
use anyhow::{bail, Context, Result};
use rep_counter::pipeline::StreamIo;
use rep_counter::reconnect::Reconnector;
use rep_counter::simulation::{run_feed, SimulatedProvider};
use rep_counter::{EngineRegistry, ExerciseSelection, SessionSlot, Settings, StreamEnds};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const USAGE: &str = "usage: rep_counter [--config <settings.json>] [--frames <n>] [exercise]

Feedback is printed to stdout as JSON lines. While running, type an
exercise id (or {\"exerciseType\": \"squat\"}) to switch, or `quit` to stop.";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    exercise: Option<String>,
    frames: Option<u64>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut argv = std::env::args().skip(1);

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--config" => {
                args.config = Some(argv.next().context("--config needs a path")?.into());
            }
            "--frames" => {
                let n = argv.next().context("--frames needs a count")?;
                args.frames = Some(n.parse().with_context(|| format!("invalid frame count: {n}"))?);
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("unknown option {flag}\n\n{USAGE}"),
            exercise => args.exercise = Some(exercise.to_string()),
        }
    }

    Ok(args)
}

enum Command {
    Quit,
    Select(ExerciseSelection),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if matches!(line, "quit" | "exit" | "teardown") {
        return Some(Command::Quit);
    }
    if line.starts_with('{') {
        return match serde_json::from_str(line) {
            Ok(selection) => Some(Command::Select(selection)),
            Err(e) => {
                warn!("ignoring control line: {}", e);
                None
            }
        };
    }
    Some(Command::Select(ExerciseSelection {
        exercise_type: line.to_string(),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for feedback
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = parse_args()?;
    let settings = Settings::load(args.config.as_deref())?;
    let registry = settings.registry();
    let selection = ExerciseSelection {
        exercise_type: args.exercise.unwrap_or_else(|| settings.default_exercise.clone()),
    };
    let exercise = registry.resolve(&selection.exercise_type);
    info!(
        %exercise,
        supported = ?EngineRegistry::supported().collect::<Vec<_>>(),
        "starting rep counter"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    // The simulated upstream accepts immediately; a real transport plugs in here.
    let capacity = settings.channel_capacity;
    let (io, ends) = Reconnector::from_settings(&settings)
        .connect(
            || async move { Ok::<_, anyhow::Error>(StreamIo::channel(capacity)) },
            &mut shutdown_rx,
        )
        .await?;
    let StreamEnds {
        frames,
        mut processed,
        mut feedback,
    } = ends;

    let (exercise_tx, exercise_rx) = watch::channel(exercise);
    let provider = SimulatedProvider::new(exercise_rx, settings.simulated_fps).with_dropouts(90);

    let mut slot = SessionSlot::new(settings.clone(), registry);
    slot.open(&selection, provider, io).await?;

    let mut feed = tokio::spawn(run_feed(frames, settings.simulated_fps, args.frames));

    let drain = tokio::spawn(async move {
        let (mut annotated, mut placeholders) = (0u64, 0u64);
        while let Some(frame) = processed.recv().await {
            if frame.is_placeholder() {
                placeholders += 1;
            } else {
                annotated += 1;
            }
        }
        debug!(annotated, placeholders, "processed stream closed");
    });

    let printer = tokio::spawn(async move {
        while let Some(result) = feedback.recv().await {
            match serde_json::to_string(&result) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("failed to encode feedback: {}", e),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(Command::Quit) => break,
                    Some(Command::Select(selection)) => {
                        let _ = exercise_tx.send(registry.resolve(&selection.exercise_type));
                        if let Err(e) = slot.switch_exercise(&selection).await {
                            warn!("{}", e);
                            break;
                        }
                    }
                    None => {}
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin unavailable: {}", e);
                    stdin_open = false;
                }
            },
            _ = &mut feed => {
                info!("feed finished");
                break;
            }
            Ok(()) = shutdown_rx.changed() => {
                info!("interrupted");
                break;
            }
        }
    }

    let summary = slot.teardown().await?;
    feed.abort();
    let _ = tokio::join!(drain, printer);

    if let Some(summary) = summary {
        info!(
            exercise = %summary.exercise,
            reps = summary.final_result.rep_count,
            frames = summary.frames_processed,
            timed_out = summary.frames_timed_out,
            emitted = summary.results_emitted,
            "done"
        );
    }

    Ok(())
}
