mod detect;
mod layout;
mod script;
mod sim;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pingboard_core::{KeyPosition, NoteName, ScanConfig, ScanPolicy, Wiring};
use std::fs;

use detect::Identity;
use script::Script;
use sim::NoteKind;

#[derive(Parser)]
#[command(name = "pingboard-cli")]
#[command(about = "Pingboard MIDI keyboard development tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the key map: matrix position, key line and note for every key
    Notes,
    /// Write an HTML/SVG picture of the keyboard
    Layout {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Run the scanning core against a scripted, simulated matrix
    Simulate {
        /// Path to the JSON simulation script
        script: String,
        /// JSON scan configuration (defaults if omitted)
        #[arg(short, long)]
        config: Option<String>,
        /// Override the configured scan policy
        #[arg(short, long)]
        policy: Option<Policy>,
        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the default scan configuration as JSON
    Config,
    /// Detect if a Pingboard is connected
    Detect,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Strict,
    Edge,
}

impl From<Policy> for ScanPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Strict => ScanPolicy::StrictUniqueness,
            Policy::Edge => ScanPolicy::EdgePriority,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Notes => print_notes()?,
        Command::Layout { output } => {
            let html = layout::generate_html();
            match output {
                Some(path) => {
                    fs::write(&path, html).with_context(|| format!("writing {}", path))?;
                    println!("Layout written to {}", path);
                }
                None => print!("{}", html),
            }
        }
        Command::Simulate {
            script,
            config,
            policy,
            quiet,
        } => simulate(&script, config.as_deref(), policy, quiet)?,
        Command::Config => {
            let json = serde_json::to_string_pretty(&ScanConfig::default())
                .context("serializing default config")?;
            println!("{}", json);
        }
        Command::Detect => {
            let found = detect::scan()?;
            let mut any = false;
            for device in &found {
                let label = match device.identity() {
                    Identity::Pingboard => "Pingboard detected",
                    Identity::Possible => "Possible Pingboard (name unreadable, check permissions)",
                    Identity::Other => continue,
                };
                any = true;
                println!("{} on bus {:03} device {:03}", label, device.bus, device.address);
            }
            if !any {
                println!("Pingboard not detected.");
            }
        }
    }

    Ok(())
}

fn print_notes() -> Result<()> {
    let wiring = board_wiring()?;
    println!("group  pos  line  note  name");
    for key in KeyPosition::all() {
        let note = key.note();
        println!(
            "{:>5}  {:>3}  {:>4}  {:>4}  {}",
            key.group,
            key.position,
            wiring.key_line(key.position),
            note,
            NoteName(note)
        );
    }
    Ok(())
}

fn board_wiring() -> Result<Wiring> {
    let wiring = Wiring::default();
    wiring.validate().context("invalid key-line wiring")?;
    Ok(wiring)
}

fn load_config(path: Option<&str>, policy: Option<Policy>) -> Result<ScanConfig> {
    let mut config: ScanConfig = match path {
        Some(path) => {
            let contents =
                fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            serde_json::from_str(&contents).with_context(|| format!("parsing {}", path))?
        }
        None => ScanConfig::default(),
    };
    if let Some(policy) = policy {
        config.policy = policy.into();
    }
    config.validate().context("invalid scan configuration")?;
    Ok(config)
}

fn simulate(path: &str, config: Option<&str>, policy: Option<Policy>, quiet: bool) -> Result<()> {
    let config = load_config(config, policy)?;
    let wiring = board_wiring()?;
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let script = Script::parse(&contents).with_context(|| format!("loading script {}", path))?;

    log::info!(
        "simulating {}us with {:?}, threshold {}, drive period {}us",
        script.duration_us,
        config.policy,
        config.debounce_threshold,
        config.drive_period_us
    );

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(u64::from(script.duration_us));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} us")
                .context("building progress bar style")?
                .progress_chars("=> "),
        );
        pb.set_message("Scanning");
        pb
    };

    let report = sim::run(&script, &config, wiring, &pb);
    pb.finish_and_clear();

    for event in &report.events {
        let kind = match event.kind {
            NoteKind::On => "note on ",
            NoteKind::Off => "note off",
        };
        println!(
            "{:>10}us  {}  {:<4} ({:>3})  vel {:>3}  ch {}",
            event.at,
            kind,
            NoteName(event.note).to_string(),
            event.note,
            event.velocity,
            event.channel
        );
    }

    println!(
        "{} iterations ({} idle), {} drive ticks, {} note events, {} inbound messages discarded",
        report.iterations,
        report.idle,
        report.drive_ticks,
        report.events.len(),
        report.discarded
    );
    if let Some(at) = report.halted_at {
        eprintln!("Halted at {}us: supply changed after startup. Reset required.", at);
    }

    Ok(())
}
