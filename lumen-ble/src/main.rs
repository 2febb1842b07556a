//! Host runner for the Lumen dimmer
//!
//! Runs the pairing and remote-control engine against the system Bluetooth
//! adapter, and inspects or edits the persisted state in LUMEN_HOME.

mod actuator;
mod radio;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use lumen_device::{
    Config, Dimmer, FileStorage, KeyStore, PinStore, Profiles, SettingsStore, Storage, Transport, lumen_home,
};
use lumen_mcu::mac_to_string;
use tracing_subscriber::EnvFilter;

use actuator::{LogActuator, SysfsPwm};
use radio::BtleRadio;

#[derive(Parser)]
#[command(name = "lumen-ble")]
#[command(about = "BLE remote dimmer")]
struct Cli {
    /// State directory (default: $LUMEN_HOME or ~/.lumen)
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    /// Config file (default: <home>/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for the remote and drive the dimmer
    Run {
        /// Override the configured transport
        #[arg(long)]
        transport: Option<TransportArg>,
        /// sysfs PWM channel to drive, levels are only logged without it
        #[arg(long)]
        pwm: Option<PathBuf>,
        /// PWM period in nanoseconds
        #[arg(long, default_value = "1000000")]
        pwm_period_ns: u64,
    },
    /// Show the paired remote and brightness profiles
    Status,
    /// Select the current profile
    Select { profile: String },
    /// Replace the profiles with a JSON mapping of name to levels
    Import { file: PathBuf },
    /// Forget the remote and the profiles
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportArg {
    Gatt,
    Beacon,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Gatt => Transport::Gatt,
            TransportArg::Beacon => Transport::Beacon,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let home = match cli.home {
        Some(home) => {
            std::fs::create_dir_all(&home).with_context(|| format!("creating {}", home.display()))?;
            home
        }
        None => lumen_home()?,
    };
    let config_path = cli.config.unwrap_or_else(|| home.join("config.json"));
    let mut config = Config::load(&config_path)?;
    let mut storage = FileStorage::new(&home).with_context(|| format!("opening {}", home.display()))?;

    match cli.command {
        Commands::Run { transport, pwm, pwm_period_ns } => {
            if let Some(transport) = transport {
                config.transport = transport.into();
            }
            let mut radio = BtleRadio::open().await?;
            match pwm {
                Some(channel) => {
                    let pwm = SysfsPwm::open(&channel, pwm_period_ns)
                        .with_context(|| format!("opening PWM {}", channel.display()))?;
                    Dimmer::load(storage, pwm, config).run(&mut radio).await;
                }
                None => Dimmer::load(storage, LogActuator, config).run(&mut radio).await,
            }
        }
        Commands::Status => {
            let keys = KeyStore::load(storage.clone());
            let pins = PinStore::load(storage.clone());
            let settings = SettingsStore::load(storage);

            println!("Home:      {}", home.display());
            println!("Transport: {:?}", config.transport);
            if keys.is_paired() {
                println!("Remote key: {}", keys.current());
            } else {
                println!("Remote key: (unpaired)");
            }
            match pins.pinned() {
                Some(mac) => println!("Pinned remote: {}", mac_to_string(&mac)),
                None => println!("Pinned remote: (none)"),
            }
            println!("Profiles:");
            for (name, levels) in &settings.collection().profiles {
                let marker = if name == settings.current_profile() { "*" } else { " " };
                println!("  {marker} {name}: {levels:?}");
            }
        }
        Commands::Select { profile } => {
            let mut settings = SettingsStore::load(storage);
            settings.select_profile(&profile)?;
            println!("Selected profile '{profile}'");
        }
        Commands::Import { file } => {
            let data = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let profiles: Profiles =
                serde_json::from_slice(&data).with_context(|| format!("parsing {}", file.display()))?;
            let mut settings = SettingsStore::load(storage);
            settings.replace_profiles(profiles)?;
            println!("Imported {} profile(s)", settings.collection().profiles.len());
        }
        Commands::Reset => {
            storage.clear_all()?;
            println!("Remote and profiles cleared");
        }
    }

    Ok(())
}
