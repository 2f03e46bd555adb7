//! Argument parsing for the `comfoconnect` binary (spec §6's CLI surface).

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::Verbosity;

/// ComfoConnect LAN-C ventilation bridge client.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub verbose: Verbosity,

    #[command(subcommand)]
    pub command: Command,
}

/// Common connection flags shared by every subcommand that talks to a
/// bridge.
#[derive(clap::Args, Clone)]
pub struct ConnectionArgs {
    /// Bridge TCP address, e.g. 192.168.1.50:56747.
    #[arg(long, env = "COMFOCONNECT_HOST")]
    pub host: SocketAddr,

    /// This app's stable 16-byte identifier, as hex. Generated at random
    /// and logged if omitted — pin it with `--local-uuid` to keep
    /// registration valid across runs (spec §6).
    #[arg(long, env = "COMFOCONNECT_LOCAL_UUID")]
    pub local_uuid: Option<String>,

    /// Per-request timeout, in seconds.
    #[arg(long, default_value = "5")]
    pub timeout: u64,

    /// Disable automatic reconnect with backoff.
    #[arg(long)]
    pub no_reconnect: bool,
}

impl ConnectionArgs {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Broadcast for bridges on the local network.
    Discover {
        /// Collection window, in milliseconds.
        #[arg(long, default_value = "2000")]
        timeout_ms: u64,
    },
    /// Register this app with a bridge.
    Register {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// Device name presented to the bridge.
        #[arg(long, default_value = "comfoconnect-rs")]
        name: String,
        /// PIN code.
        #[arg(long, default_value = "0000")]
        pin: u32,
    },
    /// Remove a registered app by UUID.
    Deregister {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// UUID (hex) of the app to remove.
        #[arg(long)]
        uuid: String,
    },
    /// List apps currently registered with a bridge.
    ListRegistered {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Set the fan speed.
    SetSpeed {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// Target speed.
        speed: SpeedArg,
    },
    /// Set auto/manual ventilation mode.
    SetMode {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// Target mode.
        mode: ModeArg,
    },
    /// Set the bypass valve mode.
    SetBypass {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// Target bypass mode.
        mode: BypassArg,
        /// Duration to hold the override, in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Enable or disable boost mode.
    SetBoost {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// on or off.
        state: OnOff,
        /// Duration to hold boost, in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Enable or disable away mode.
    SetAway {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// on or off.
        state: OnOff,
        /// Duration to hold away mode, in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Set ComfoCool compressor mode.
    SetComfocool {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// auto or off.
        mode: ComfoCoolArg,
    },
    /// Set the seasonal temperature profile.
    SetTemperatureProfile {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// warm, normal, or cool.
        profile: TemperatureProfileArg,
    },
    /// List the static sensor catalog.
    ShowSensors {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Read (and optionally follow) one sensor's value.
    ShowSensor {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// The PDID to read.
        pdid: u32,
        /// Keep printing values as they arrive instead of reading once.
        #[arg(short, long)]
        follow: bool,
    },
    /// Issue a raw RMI get on an arbitrary unit/subunit/property.
    GetProperty {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// Unit id.
        unit: u8,
        /// Subunit id.
        subunit: u8,
        /// Property id.
        property: u8,
        /// Elementary type of the property's value.
        type_tag: TypeTagArg,
    },
}

/// `clap`-facing mirror of [`comfoconnect::Speed`].
#[derive(Clone, Copy, ValueEnum)]
pub enum SpeedArg {
    /// Away / off.
    Away,
    /// Low.
    Low,
    /// Medium.
    Medium,
    /// High.
    High,
}

/// `clap`-facing mirror of [`comfoconnect::VentilationMode`].
#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Automatic.
    Auto,
    /// Manual.
    Manual,
}

/// `clap`-facing mirror of [`comfoconnect::BypassMode`].
#[derive(Clone, Copy, ValueEnum)]
pub enum BypassArg {
    /// Automatic.
    Auto,
    /// Forced open.
    On,
    /// Forced closed.
    Off,
}

/// A plain on/off switch, for boost and away mode.
#[derive(Clone, Copy, ValueEnum)]
pub enum OnOff {
    /// Enable.
    On,
    /// Disable.
    Off,
}

impl OnOff {
    /// As a `bool`.
    pub fn enabled(self) -> bool {
        matches!(self, OnOff::On)
    }
}

/// `clap`-facing mirror of [`comfoconnect::ComfoCoolMode`].
#[derive(Clone, Copy, ValueEnum)]
pub enum ComfoCoolArg {
    /// Automatic.
    Auto,
    /// Disabled.
    Off,
}

/// `clap`-facing mirror of [`comfoconnect::TemperatureProfile`].
#[derive(Clone, Copy, ValueEnum)]
pub enum TemperatureProfileArg {
    /// Prioritize warmth.
    Warm,
    /// Balanced default.
    Normal,
    /// Prioritize cooling.
    Cool,
}

/// `clap`-facing mirror of [`comfoconnect_wire::TypeTag`].
#[derive(Clone, Copy, ValueEnum)]
pub enum TypeTagArg {
    /// Boolean.
    Bool,
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 8-bit.
    I8,
    /// Signed 16-bit.
    I16,
    /// Signed 64-bit.
    I64,
    /// UTF-8 string.
    String,
    /// Seconds-since-epoch timestamp.
    Time,
    /// Nibble-packed version.
    Version,
}

impl From<TypeTagArg> for comfoconnect_wire::TypeTag {
    fn from(arg: TypeTagArg) -> Self {
        match arg {
            TypeTagArg::Bool => Self::Bool,
            TypeTagArg::U8 => Self::U8,
            TypeTagArg::U16 => Self::U16,
            TypeTagArg::U32 => Self::U32,
            TypeTagArg::I8 => Self::I8,
            TypeTagArg::I16 => Self::I16,
            TypeTagArg::I64 => Self::I64,
            TypeTagArg::String => Self::String,
            TypeTagArg::Time => Self::Time,
            TypeTagArg::Version => Self::Version,
        }
    }
}
