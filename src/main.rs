//! print-devices: list the audio endpoints of this machine.
//!
//! Prints `id: state` per endpoint (plus its friendly name), or a JSON
//! document with `--json`. Set `RUST_LOG=wincoreaudio=debug` to trace the
//! COM calls.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use wincoreaudio::{DataFlow, DeviceState, StateMask};

// Enumeration options are only read by the Windows build.
#[derive(Parser)]
#[cfg_attr(not(windows), allow(dead_code))]
#[command(name = "print-devices")]
#[command(version)]
#[command(about = "List Windows audio endpoints and their state")]
struct Cli {
    /// Endpoint direction to enumerate
    #[arg(long, value_enum, default_value_t = FlowArg::Capture)]
    flow: FlowArg,

    /// Device states to include (repeatable, all states when omitted)
    #[arg(long, value_enum)]
    state: Vec<StateArg>,

    /// Print a JSON document instead of text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also read master volume and mute state
    #[arg(long, default_value_t = false)]
    volume: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FlowArg {
    Render,
    Capture,
    All,
}

impl From<FlowArg> for DataFlow {
    fn from(flow: FlowArg) -> Self {
        match flow {
            FlowArg::Render => DataFlow::Render,
            FlowArg::Capture => DataFlow::Capture,
            FlowArg::All => DataFlow::All,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StateArg {
    Active,
    Disabled,
    NotPresent,
    Unplugged,
}

impl From<StateArg> for DeviceState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Active => DeviceState::Active,
            StateArg::Disabled => DeviceState::Disabled,
            StateArg::NotPresent => DeviceState::NotPresent,
            StateArg::Unplugged => DeviceState::Unplugged,
        }
    }
}

#[cfg_attr(not(windows), allow(dead_code))]
fn state_mask(states: &[StateArg]) -> StateMask {
    if states.is_empty() {
        return StateMask::ALL;
    }
    states
        .iter()
        .map(|&s| StateMask::from(DeviceState::from(s)))
        .fold(StateMask(0), |mask, s| mask | s)
}

/// Volume state of an endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct VolumeDto {
    pub level: f32,
    pub level_db: f32,
    pub is_muted: bool,
}

/// One endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceDto {
    pub id: String,
    pub name: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeDto>,
}

/// Response containing a list of devices.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceDto>,
}

fn print_devices(response: &DeviceListResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }
    for device in &response.devices {
        println!("{}: {}", device.id, device.state);
        println!("    {}", device.name);
        if let Some(volume) = &device.volume {
            let muted = if volume.is_muted { ", muted" } else { "" };
            println!(
                "    volume {:.0}% ({:.1} dB{})",
                volume.level * 100.0,
                volume.level_db,
                muted
            );
        }
    }
    Ok(())
}

#[cfg(windows)]
fn collect_devices(cli: &Cli) -> anyhow::Result<DeviceListResponse> {
    use anyhow::Context;
    use wincoreaudio::win32::{ComContext, DeviceEnumerator};
    use wincoreaudio::Apartment;

    let ctx = ComContext::new(Apartment::SingleThreaded)?;
    let enumerator = DeviceEnumerator::new(&ctx).context("creating device enumerator")?;
    let collection = enumerator
        .enum_audio_endpoints(cli.flow.into(), state_mask(&cli.state))
        .context("enumerating audio endpoints")?;

    let mut devices = Vec::with_capacity(collection.len());
    for (index, device) in collection.iter().enumerate() {
        let device = device
            .into_result()
            .with_context(|| format!("fetching device {index}"))?;
        let volume = if cli.volume {
            let control = device.activate_endpoint_volume()?;
            Some(VolumeDto {
                level: control.master_volume_level_scalar()?,
                level_db: control.master_volume_level_db()?,
                is_muted: control.is_muted()?,
            })
        } else {
            None
        };
        devices.push(DeviceDto {
            id: device.id()?,
            name: device.friendly_name()?,
            state: device.state()?.to_string(),
            volume,
        });
    }
    Ok(DeviceListResponse { devices })
}

#[cfg(not(windows))]
fn collect_devices(_cli: &Cli) -> anyhow::Result<DeviceListResponse> {
    anyhow::bail!("print-devices needs the Windows Core Audio API")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let response = collect_devices(&cli)?;
    print_devices(&response, cli.json)
}
