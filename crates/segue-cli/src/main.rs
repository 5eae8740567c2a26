//! # Segue
//!
//! Plays a queue of audio files through the default output device, with
//! looping, seeking, shuffling and fades.

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use segue_audio::{output, Player, PlayerEvent};
use segue_core::{display_name, PlayerConfig, Timecode};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for segue
#[derive(Parser, Debug)]
#[command(name = "segue")]
#[command(about = "Play a queue of audio files with looping, seeking and fades")]
#[command(version)]
struct Args {
    /// Audio files to queue, in playback order
    #[arg(required_unless_present = "list_devices")]
    files: Vec<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "SEGUE_CONFIG")]
    config: Option<PathBuf>,

    /// Output sample rate, overrides the config file
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Frames per output callback, overrides the config file
    #[arg(long)]
    block_size: Option<u32>,

    /// Plays of every track (0 = forever)
    #[arg(short = 't', long, default_value_t = 1)]
    track_loops: u32,

    /// Passes over the whole queue (0 = forever)
    #[arg(short = 'l', long, default_value_t = 1)]
    queue_loops: u32,

    /// Volume as a factor from 0 to 1
    #[arg(short, long, conflicts_with = "volume_db")]
    volume: Option<f32>,

    /// Volume in decibels (0 = full scale)
    #[arg(long, allow_hyphen_values = true)]
    volume_db: Option<f32>,

    /// Fade in over this many seconds
    #[arg(long, default_value_t = 0.0)]
    fade_in: f64,

    /// Shuffle the queue before playing
    #[arg(short, long)]
    shuffle: bool,

    /// Start position in the first track: seconds, mm:ss or h:mm:ss
    #[arg(long)]
    start: Option<Timecode>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn apply(&self, config: &mut PlayerConfig) {
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(size) = self.block_size {
            config.block_size = size;
        }
    }

    fn target_volume(&self) -> f32 {
        match (self.volume, self.volume_db) {
            (Some(v), _) => v,
            (None, Some(db)) => segue_core::db_to_gain(db),
            (None, None) => 1.0,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segue=info,segue_cli=info,segue_audio=info".into()),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        for name in output::list_output_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    info!("Starting Segue v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let player = Player::new(config).context("Failed to start audio output")?;

    for file in &args.files {
        if let Err(e) = player.queue(file) {
            warn!("Skipping {}: {e}", file.display());
        }
    }
    if player.is_empty() {
        bail!("None of the given files could be played");
    }

    setup_queue(&player, &args)?;
    spawn_event_log(&player);

    let volume = args.target_volume();
    if args.fade_in > 0.0 {
        let pace = Duration::try_from_secs_f64(args.fade_in)
            .with_context(|| format!("Invalid fade-in duration {}", args.fade_in))?;
        player.set_volume(0.0, Duration::ZERO)?;
        player.play()?;
        player.set_volume(volume, pace)?;
    } else {
        player.set_volume(volume, Duration::ZERO)?;
        player.play()?;
    }

    if let Some(name) = player.current_track() {
        info!("Now playing {name}");
    }

    player.wait_for_queue(true);
    player.terminate();
    Ok(())
}

fn setup_queue(player: &Player, args: &Args) -> Result<()> {
    if args.track_loops != 1 {
        for index in 0..player.len() {
            player.loop_track(Some(index), args.track_loops)?;
        }
    }
    player.loop_queue(args.queue_loops);

    if args.shuffle {
        player.shuffle(false);
    }
    if let Some(start) = args.start {
        player
            .jump_to(start)
            .with_context(|| format!("Cannot start at {start}"))?;
    }
    Ok(())
}

/// Log track changes from the player's event channel.
fn spawn_event_log(player: &Player) {
    let events = player.events();
    let names: Vec<String> = player
        .tracks()
        .iter()
        .map(|t| display_name(&t.source))
        .collect();

    std::thread::spawn(move || {
        for event in events.iter() {
            match event {
                PlayerEvent::TrackEnded { index } => {
                    let next = (index + 1) % names.len().max(1);
                    info!(
                        "Finished {}, next up {}",
                        names.get(index).map_or("?", String::as_str),
                        names.get(next).map_or("?", String::as_str)
                    );
                }
                PlayerEvent::QueueEnded => info!("Queue finished"),
                other => debug!("{other:?}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]

    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "segue",
            "a.flac",
            "b.mp3",
            "--queue-loops",
            "0",
            "--volume-db",
            "-6",
            "--start",
            "1:30",
            "--shuffle",
        ]);
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.queue_loops, 0);
        assert_eq!(args.track_loops, 1);
        assert_eq!(args.start, Some(Timecode::from_seconds(90)));
        assert!(args.shuffle);
        assert!((args.target_volume() - 0.501).abs() < 1e-3);
    }

    #[test]
    fn test_args_require_files() {
        assert!(Args::try_parse_from(["segue"]).is_err());
        assert!(Args::try_parse_from(["segue", "--list-devices"]).is_ok());
    }

    #[test]
    fn test_bad_timecode_rejected() {
        assert!(Args::try_parse_from(["segue", "a.wav", "--start", "1:75"]).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let args = Args::parse_from(["segue", "a.wav", "--sample-rate", "48000"]);
        let mut config = PlayerConfig::default();
        args.apply(&mut config);
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.block_size, 1028);
        assert_eq!(args.target_volume(), 1.0);
    }
}
