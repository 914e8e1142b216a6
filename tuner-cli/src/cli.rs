//! Command-line interface for the tuner
//!
//! Handles argument parsing and logging configuration.

use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use log::LevelFilter;
use tuner_core::DEFAULT_CONCERT_A;
use tuner_core::capture::{
    CaptureConfig, DEFAULT_CAPTURE_SECONDS, DEFAULT_FRAMES_PER_BUFFER, DEFAULT_SAMPLE_RATE,
};

/// Tuner - musical note lookup and live input capture
#[derive(Parser, Debug)]
#[command(name = "tuner")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the note nearest to a frequency
    Note {
        /// Frequency in Hz
        #[arg(short = 'f', long = "frequency")]
        frequency: f32,

        /// Frequency of A4 in Hz
        #[arg(default_value_t = DEFAULT_CONCERT_A)]
        concert_a: f32,

        /// Print the note as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print every note of a range of octaves
    #[command(allow_negative_numbers = true)]
    Table {
        /// First octave
        #[arg(default_value_t = 2)]
        octave_start: i32,

        /// Last octave (defaults to the first)
        octave_end: Option<i32>,

        /// Frequency of A4 in Hz
        #[arg(default_value_t = DEFAULT_CONCERT_A)]
        concert_a: f32,
    },

    /// Capture the default input device and report frames per interval
    Listen(ListenArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ListenArgs {
    /// Sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Frames per callback buffer
    #[arg(long, default_value_t = DEFAULT_FRAMES_PER_BUFFER)]
    pub frames_per_buffer: u32,

    /// Number of input channels (1 or 2)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=2))]
    pub channels: u16,

    /// Seconds of audio kept in the ring buffer
    #[arg(long, default_value_t = DEFAULT_CAPTURE_SECONDS)]
    pub seconds: u32,

    /// Milliseconds between two frame count reports
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
}

impl ListenArgs {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            frames_per_buffer: self.frames_per_buffer,
            channel_count: self.channels,
            capture_seconds: self.seconds,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    builder.filter_module("tuner", args.log_level());
    builder.filter_module("tuner_core", args.log_level());

    // Audio backend internals only at -vvv
    if args.verbose >= 3 {
        builder.filter_module("cpal", args.log_level());
    }

    builder.format_timestamp_millis().init();
}
