use anyhow::Context;
use clap::Parser;
use printbridge::{
    init_logging, list_ports, telnet, Bridge, Config, EventDispatcher, RealSerialPort,
    BUILD_DATE, BUILD_TARGET, LOOP_PERIOD, VERSION,
};
use std::path::PathBuf;
use tokio::net::TcpListener;

/// Network-to-serial bridge for Marlin 3D printers
#[derive(Parser, Debug)]
#[command(name = "printbridge", version, about)]
struct Cli {
    /// Path to a TOML or JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, overriding the config file
    #[arg(short, long)]
    port: Option<String>,

    /// Telnet listen address, overriding the config file
    #[arg(long)]
    telnet: Option<String>,

    /// Disable the telnet console
    #[arg(long, conflicts_with = "telnet")]
    no_telnet: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let mut config = Config::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }
    if let Some(bind) = &cli.telnet {
        config.telnet.enabled = true;
        config.telnet.bind = bind.clone();
    }
    if cli.no_telnet {
        config.telnet.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.logging)?;

    if cli.list_ports {
        for port in list_ports()? {
            println!("{}\t{}", port.port_name, port.description);
        }
        return Ok(());
    }

    tracing::info!("printbridge {} ({}, built {})", VERSION, BUILD_TARGET, BUILD_DATE);
    tracing::info!("Serial port {}", config.serial.port);

    let link = RealSerialPort::new(config.serial.port.as_str());
    let bridge = Bridge::new(Box::new(link), &config, EventDispatcher::default())?;
    let (handle, mut task) = printbridge::spawn(bridge, LOOP_PERIOD);

    if config.telnet.enabled {
        let listener = TcpListener::bind(&config.telnet.bind)
            .await
            .with_context(|| format!("binding telnet console to {}", config.telnet.bind))?;
        let console = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = telnet::serve(listener, console).await {
                tracing::error!("Telnet console stopped: {}", e);
            }
        });
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down");
        }
        result = &mut task => {
            result?;
        }
    }

    drop(handle);
    Ok(())
}
