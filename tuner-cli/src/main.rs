//! # Tuner
//!
//! Command-line front end for `tuner-core`.
//!
//! ## Commands
//! - **note**: nearest note, octave and cents offset of a frequency
//! - **table**: every note of a range of octaves with its frequency
//! - **listen**: capture the default input device and print how many frames
//!   arrived per interval until Ctrl-C

mod cli;
mod output;

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tuner_core::{audio, frequency_to_note, tuning};

use cli::{Args, Command, ListenArgs};

/// Exit status of a process killed by SIGINT.
const SIGINT_EXIT_CODE: i32 = 130;

fn main() -> Result<()> {
    let args = Args::parse();
    cli::init_logging(&args);

    match args.command {
        Command::Note {
            frequency,
            concert_a,
            json,
        } => print_note(frequency, concert_a, json),
        Command::Table {
            octave_start,
            octave_end,
            concert_a,
        } => print_table(octave_start, octave_end.unwrap_or(octave_start), concert_a),
        Command::Listen(listen) => run_listen(&listen),
    }
}

fn print_note(frequency: f32, concert_a: f32, json: bool) -> Result<()> {
    let note = frequency_to_note(frequency, concert_a)
        .with_context(|| format!("cannot map {frequency} Hz to a note"))?;

    if json {
        let report = output::NoteReport::new(frequency, concert_a, note);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", output::note_line(frequency, &note));
    }
    Ok(())
}

fn print_table(octave_start: i32, octave_end: i32, concert_a: f32) -> Result<()> {
    let table = tuning::octave_table(octave_start, octave_end, concert_a)
        .context("cannot build note table")?;

    for entry in &table {
        let detected = frequency_to_note(entry.frequency, concert_a)?;
        println!("{}", output::table_line(entry, &detected));
    }
    Ok(())
}

fn run_listen(args: &ListenArgs) -> Result<()> {
    let config = args.capture_config();
    let stream = audio::start_audio_capture(config).context("failed to start audio capture")?;
    info!(
        "Listening on '{}' at {} Hz, press Ctrl-C to stop",
        stream.device_name(),
        stream.sample_rate()
    );

    let handle = stream.handle();
    ctrlc::set_handler(move || {
        if handle.is_termination_requested() {
            // Second interrupt: behave like the default SIGINT disposition.
            process::exit(SIGINT_EXIT_CODE);
        }
        warn!("Interrupt received, stopping capture");
        handle.request_termination();
    })
    .context("failed to install Ctrl-C handler")?;

    stream
        .run(args.interval(), |frames| println!("{}", output::count_line(frames)))
        .context("audio stream failed")?;
    Ok(())
}
