//! # Etiqueta CLI
//!
//! Command-line interface for thermal label printing.
//!
//! ## Usage
//!
//! ```bash
//! # Print an image (two copies, a little lighter)
//! etiqueta print badge.png --copies 2 --density 10
//!
//! # See what would be printed without touching the printer
//! etiqueta preview badge.png --png preview.png --scale 3
//!
//! # Device queries
//! etiqueta battery
//! etiqueta config --json
//! etiqueta status
//!
//! # Settings
//! etiqueta timeout 30
//! etiqueta beep off
//! ```

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use etiqueta::{
    EtiquetaError, LinkConfig, PrintSession, SerialTransport,
    protocol::{
        bitmap::{build_job, JobSettings},
        TimeoutSetting,
    },
    render::{
        dither::DitheringAlgorithm,
        image::{load_label, LoadOptions},
        preview,
    },
    transport::serial::DEFAULT_DEVICE,
};

/// Etiqueta - Thermal label printer utility
#[derive(Parser, Debug)]
#[command(name = "etiqueta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printer device path (an already bound RFCOMM node)
    #[arg(long, global = true, env = "ETIQUETA_DEVICE", default_value = DEFAULT_DEVICE)]
    device: String,

    /// Override the reply timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// JSON file with link tuning (timeouts, ready polling)
    #[arg(long, global = true, value_name = "FILE")]
    link_config: Option<PathBuf>,

    /// Log wire traffic
    #[arg(long, global = true)]
    debug: bool,

    /// Print query results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ImageArgs {
    /// Image file to print (any common format)
    image: PathBuf,

    /// Dithering algorithm: floyd-steinberg, bayer or threshold
    #[arg(long, default_value_t = DitheringAlgorithm::FloydSteinberg)]
    dither: DitheringAlgorithm,

    /// Contrast factor applied before dithering
    #[arg(long, default_value_t = 2.0)]
    contrast: f32,

    /// Skip the automatic level stretch
    #[arg(long)]
    no_autocontrast: bool,

    /// Keep portrait images as they are instead of turning them sideways
    #[arg(long)]
    no_rotate: bool,

    /// Swap ink and paper
    #[arg(long)]
    invert: bool,
}

impl ImageArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            autocontrast: !self.no_autocontrast,
            contrast: self.contrast,
            auto_rotate: !self.no_rotate,
            invert: self.invert,
            dither: self.dither,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an image on a label
    Print {
        #[command(flatten)]
        image: ImageArgs,

        /// Number of copies
        #[arg(long, default_value_t = 1)]
        copies: u32,

        /// Print darkness (0-15)
        #[arg(long, default_value_t = 15)]
        density: u8,

        /// Label size in millimeters, WIDTHxLENGTH
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        size: Option<(f32, f32)>,

        /// Gap between labels in millimeters
        #[arg(long)]
        gap: Option<f32>,

        /// Send the job without polling for readiness first
        #[arg(long)]
        no_wait: bool,
    },

    /// Render an image to PNG exactly as it would be printed
    Preview {
        #[command(flatten)]
        image: ImageArgs,

        /// Output PNG file
        #[arg(long, value_name = "FILE")]
        png: PathBuf,

        /// Enlarge each dot to an NxN block
        #[arg(long, default_value_t = 1)]
        scale: u32,
    },

    /// Show the battery level
    Battery,

    /// Show the device configuration
    Config,

    /// Show the status frame (also releases a paused printer)
    Status,

    /// Show whether the printer will accept a job
    Ready,

    /// Set the auto power-off timeout in minutes (0 = never)
    Timeout {
        #[arg(value_parser = ["0", "15", "30", "60"])]
        minutes: String,
    },

    /// Turn the button beep on or off
    Beep {
        #[arg(value_parser = parse_on_off, action = clap::ArgAction::Set)]
        state: bool,
    },

    /// Print the built-in self-test page
    Selftest,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), EtiquetaError> {
    let link = link_config(&cli)?;

    match &cli.command {
        Commands::Print {
            image,
            copies,
            density,
            size,
            gap,
            no_wait,
        } => {
            let mut settings = JobSettings {
                copies: *copies,
                density: *density,
                ..JobSettings::default()
            };
            if let Some(size) = size {
                settings.label_mm = *size;
            }
            if let Some(gap) = gap {
                settings.gap_mm.0 = *gap;
            }

            // Build the whole job before the device is opened so bad input
            // never costs a connection
            let label = load_label(&image.image, &image.load_options())?;
            let job = build_job(&label, &settings)?;

            let mut session = open_session(&cli, &link)?;
            let receipt = if *no_wait {
                session.submit_now(&job)?
            } else {
                session.submit(&job)?
            };

            if cli.json {
                emit_json(&receipt)?;
            } else {
                println!(
                    "Printed {} label(s), {} bytes sent",
                    job.copies(),
                    receipt.bytes
                );
            }
        }
        Commands::Battery => {
            let battery = open_session(&cli, &link)?.battery()?;
            output(cli.json, &battery)?;
        }
        Commands::Config => {
            let config = open_session(&cli, &link)?.config()?;
            output(cli.json, &config)?;
        }
        Commands::Status => {
            let status = open_session(&cli, &link)?.status()?;
            output(cli.json, &status)?;
        }
        Commands::Ready => {
            let readiness = open_session(&cli, &link)?.readiness()?;
            if cli.json {
                emit_json(&serde_json::json!({
                    "ready": readiness.is_ready(),
                    "readiness": readiness,
                }))?;
            } else {
                println!("{}", readiness);
            }
        }
        Commands::Preview { image, png, scale } => {
            let label = load_label(&image.image, &image.load_options())?;
            preview::save_png(&label, png, *scale)?;
            println!("Saved to {}", png.display());
        }
        Commands::Timeout { minutes } => {
            let minutes = minutes
                .parse::<u32>()
                .map_err(|e| EtiquetaError::InvalidArgument(e.to_string()))?;
            let setting = TimeoutSetting::from_minutes(minutes)?;
            let mut session = open_session(&cli, &link)?;
            session.set_timeout(setting)?;

            // Read the settings back so the output shows what the device kept
            let config = session.config()?;
            if config.timeout != setting {
                warn!(requested = %setting, reported = %config.timeout, "timeout not applied");
            }
            output(cli.json, &config)?;
        }
        Commands::Beep { state } => {
            let mut session = open_session(&cli, &link)?;
            session.set_beep(*state)?;

            let config = session.config()?;
            if config.beep_enabled != *state {
                warn!(requested = *state, reported = config.beep_enabled, "beep not applied");
            }
            output(cli.json, &config)?;
        }
        Commands::Selftest => {
            open_session(&cli, &link)?.self_test()?;
            println!("Self-test page requested");
        }
    }

    Ok(())
}

fn link_config(cli: &Cli) -> Result<LinkConfig, EtiquetaError> {
    let mut link = match &cli.link_config {
        Some(path) => LinkConfig::from_file(path)?,
        None => LinkConfig::default(),
    };
    if let Some(ms) = cli.timeout_ms {
        link.read_timeout_ms = ms;
    }
    Ok(link)
}

fn open_session(cli: &Cli, link: &LinkConfig) -> Result<PrintSession<SerialTransport>, EtiquetaError> {
    tracing::debug!(device = %cli.device, "opening printer");
    let transport = SerialTransport::open(&cli.device)?;
    Ok(PrintSession::new(transport, link))
}

fn output<T: Serialize + std::fmt::Display>(json: bool, value: &T) -> Result<(), EtiquetaError> {
    if json {
        emit_json(value)
    } else {
        println!("{}", value);
        Ok(())
    }
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> Result<(), EtiquetaError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| EtiquetaError::InvalidArgument(format!("Failed to encode JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

/// Parse `14x40` (or `14.0X40.5`) into millimeters.
fn parse_size(s: &str) -> Result<(f32, f32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxLENGTH, got '{}'", s))?;
    let w: f32 = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
    let h: f32 = h.trim().parse().map_err(|_| format!("bad length '{}'", h))?;
    Ok((w, h))
}

fn parse_on_off(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}
