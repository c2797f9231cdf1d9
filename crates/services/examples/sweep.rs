// Copyright (c) 2024 Mike Tsao

use clap::Parser;
use std::time::{Duration, Instant};
use tonesweep::prelude::*;
use tonesweep_services::SweepEngine;

#[derive(clap::Parser, Debug)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Center frequency in Hz
    #[clap(short, long, default_value_t = 1000.0)]
    center: f64,

    /// Quality factor (center divided by bandwidth)
    #[clap(short, long, default_value_t = 10.0)]
    quality: f64,

    /// How long to play, in seconds
    #[clap(short, long, default_value_t = 5.0)]
    seconds: f64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // The engine owns the device only while running, so constructing it can't
    // fail; start() is where a missing output device would surface.
    let mut engine = SweepEngine::default();
    engine.set_center(FrequencyHz(args.center))?;
    let range = engine.set_quality(args.quality)?;
    println!(
        "Sweeping {} to {} around {}",
        range.low(),
        range.high(),
        range.center()
    );

    engine.start()?;

    let deadline = Instant::now() + Duration::from_secs_f64(args.seconds);
    while Instant::now() < deadline {
        // Poll for fault events the way a GUI event loop would, and show the
        // live frequency readout while we're at it.
        if let Ok(event) = engine.events().recv_timeout(Duration::from_millis(250)) {
            println!("engine event: {event:?}");
        }
        println!("  now at {}", engine.current_frequency());
    }

    engine.stop()?;
    println!("Device released.");
    Ok(())
}
