//! `glasspanel` - CLI for the glass dashboard
//!
//! This binary replays recorded simulator property logs through the
//! dashboard and manages its configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, Write};
use std::time::Duration;

use clap::Parser;

use glasspanel::cli::{Cli, Command, ConfigCommand, OutputFormat, ReplayCommand};
use glasspanel::replay::{self, ReplayEvent, ReplayStats, Replayer};
use glasspanel::{init_logging, Config, HtmlRenderer, Panel, Renderer, ReplayTransport, TextRenderer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Replay(replay_cmd) => handle_replay(&config, &replay_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_replay(config: &Config, cmd: &ReplayCommand) -> Result<(), Box<dyn std::error::Error>> {
    let events = replay::load(&cmd.file)?;
    let period = config.frame_period();

    let stats = if let Some(out) = &cmd.html {
        let panel = Panel::new(config, ReplayTransport::new(), HtmlRenderer::new())?;
        let (stats, panel) = drive(panel, events, period, cmd.realtime)?;
        let html = panel.dashboard().renderer().to_html();
        std::fs::write(out, html)?;
        if cmd.format == OutputFormat::Text {
            println!("Wrote {}", out.display());
        }
        stats
    } else {
        let sink: Box<dyn Write> = match cmd.format {
            OutputFormat::Text => Box::new(io::stdout()),
            OutputFormat::Json => Box::new(io::sink()),
        };
        let panel = Panel::new(config, ReplayTransport::new(), TextRenderer::new(sink))?;
        drive(panel, events, period, cmd.realtime)?.0
    };

    match cmd.format {
        OutputFormat::Text => {
            println!();
            println!("Events:   {}", stats.events);
            println!("Frames:   {}", stats.ticks);
            println!("Rendered: {}", stats.rendered);
            println!("Elapsed:  {} ms", stats.elapsed.as_millis());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}

fn drive<R: Renderer + 'static>(
    panel: Panel<ReplayTransport, R>,
    events: Vec<ReplayEvent>,
    period: Duration,
    realtime: bool,
) -> Result<(ReplayStats, Panel<ReplayTransport, R>), Box<dyn std::error::Error>> {
    let mut replayer = Replayer::new(panel, events, period);
    let stats = if realtime {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(replayer.run_realtime())
    } else {
        replayer.run()
    };
    Ok((stats, replayer.into_panel()))
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let d = &config.dashboard;
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Dashboard]");
                println!("  Max rpm:            {}", d.max_rpm);
                println!("  Max cht (°F):       {}", d.max_cht);
                println!("  Max fuel (gal):     {}", d.max_fuel);
                println!("  Smooth factor:      {}", d.smooth_factor);
                println!(
                    "  Rpm thresholds:     {} / {}",
                    d.rpm_thresholds.warn(),
                    d.rpm_thresholds.alarm()
                );
                println!(
                    "  Cht thresholds:     {} / {}",
                    d.cht_thresholds.warn(),
                    d.cht_thresholds.alarm()
                );
                println!(
                    "  Fuel thresholds:    {} / {}",
                    d.fuel_thresholds.warn(),
                    d.fuel_thresholds.alarm()
                );
                println!();
                println!("[Panel]");
                println!("  Frame rate (Hz):    {}", config.panel.frame_rate_hz);
                println!();
                println!("[Instruments]");
                for inst in &config.instruments {
                    println!("  {} ({})", inst.name, inst.options().policy());
                    for prop in &inst.properties {
                        println!("    {:<8} {}", prop.alias, prop.path);
                    }
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
