//! `comfoconnect`: a command-line driver for the ComfoConnect LAN-C
//! ventilation bridge protocol engine in the `comfoconnect` crate.

mod cli;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use cli::{Cli, Command, ConnectionArgs};
use comfoconnect::error::{Error, RequestError, SessionError};
use comfoconnect::session::SessionConfig;
use comfoconnect::{Bridge, BypassMode, ComfoCoolMode, Speed, TemperatureProfile, VentilationMode};

const EXIT_SUCCESS: u8 = 0;
const EXIT_GENERIC_FAILURE: u8 = 1;
const EXIT_NOT_REGISTERED: u8 = 2;
const EXIT_CONNECT_TIMEOUT: u8 = 3;
const EXIT_RMI_ERROR: u8 = 4;

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let runtime = tokio::runtime::Runtime::new().expect("failed to start the tokio runtime");

    match runtime.block_on(run(cli.command)) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn exit_code_for(error: &Error) -> u8 {
    match error {
        Error::Session(SessionError::NotRegistered) => EXIT_NOT_REGISTERED,
        Error::Request(RequestError::Timeout) => EXIT_CONNECT_TIMEOUT,
        Error::Rmi(_) => EXIT_RMI_ERROR,
        _ => EXIT_GENERIC_FAILURE,
    }
}

fn parse_local_uuid(hex_str: Option<&str>) -> [u8; 16] {
    match hex_str {
        Some(hex_str) => {
            let bytes = hex::decode(hex_str).expect("--local-uuid must be valid hex");
            bytes.try_into().expect("--local-uuid must decode to exactly 16 bytes")
        }
        None => {
            log::warn!(
                "no --local-uuid given; generating a random one for this run. \
                 Registration will not persist across restarts unless you pin it."
            );
            *uuid::Uuid::new_v4().as_bytes()
        }
    }
}

fn session_config(connection: &ConnectionArgs) -> SessionConfig {
    SessionConfig {
        addr: connection.host,
        local_uuid: parse_local_uuid(connection.local_uuid.as_deref()),
        bridge_uuid: [0; 16],
        device_name: "comfoconnect-cli".to_owned(),
        pin: 0,
        request_timeout: connection.request_timeout(),
        keepalive_interval: Duration::from_secs(5),
        auto_reconnect: !connection.no_reconnect,
    }
}

async fn connected_bridge(connection: &ConnectionArgs) -> Result<Bridge, Error> {
    let bridge = Bridge::new(session_config(connection));
    bridge.connect().await?;
    Ok(bridge)
}

async fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Discover { timeout_ms } => {
            let bridges = comfoconnect::discovery::discover(
                Duration::from_millis(timeout_ms),
                std::net::Ipv4Addr::new(255, 255, 255, 255),
                comfoconnect::discovery::DEFAULT_PORT,
            )
            .await?;

            for bridge in bridges {
                println!("{}\t{}\t{}", bridge.ip_address, hex::encode(&bridge.uuid), bridge.version);
            }

            Ok(())
        }

        Command::Register { connection, name, pin } => {
            let config = SessionConfig {
                device_name: name,
                pin,
                ..session_config(&connection)
            };
            let bridge = Bridge::new(config);
            bridge.connect().await?;
            println!("registered");
            bridge.disconnect().await;
            Ok(())
        }

        Command::Deregister { connection, uuid } => {
            let bridge = connected_bridge(&connection).await?;
            let uuid_bytes: [u8; 16] = hex::decode(&uuid)
                .map_err(|_| RequestError::UnexpectedReply)?
                .try_into()
                .map_err(|_| RequestError::UnexpectedReply)?;

            let result = bridge.session().deregister_app(uuid_bytes).await;
            bridge.disconnect().await;
            result
        }

        Command::ListRegistered { connection } => {
            let bridge = connected_bridge(&connection).await?;
            let result = bridge.session().list_registered_apps().await;
            bridge.disconnect().await;

            match result {
                Ok(apps) => {
                    for app in apps {
                        println!("{}\t{}", hex::encode(&app.uuid), app.device_name);
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }

        Command::SetSpeed { connection, speed } => {
            let bridge = connected_bridge(&connection).await?;
            let speed = match speed {
                cli::SpeedArg::Away => Speed::Away,
                cli::SpeedArg::Low => Speed::Low,
                cli::SpeedArg::Medium => Speed::Medium,
                cli::SpeedArg::High => Speed::High,
            };
            let result = bridge.set_speed(speed).await;
            bridge.disconnect().await;
            result
        }

        Command::SetMode { connection, mode } => {
            let bridge = connected_bridge(&connection).await?;
            let mode = match mode {
                cli::ModeArg::Auto => VentilationMode::Auto,
                cli::ModeArg::Manual => VentilationMode::Manual,
            };
            let result = bridge.set_mode(mode).await;
            bridge.disconnect().await;
            result
        }

        Command::SetBypass { connection, mode, timeout } => {
            let bridge = connected_bridge(&connection).await?;
            let mode = match mode {
                cli::BypassArg::Auto => BypassMode::Auto,
                cli::BypassArg::On => BypassMode::On,
                cli::BypassArg::Off => BypassMode::Off,
            };
            let result = bridge.set_bypass(mode, timeout.map(Duration::from_secs)).await;
            bridge.disconnect().await;
            result
        }

        Command::SetBoost { connection, state, timeout } => {
            let bridge = connected_bridge(&connection).await?;
            let result = bridge
                .set_boost(state.enabled(), timeout.map(Duration::from_secs))
                .await;
            bridge.disconnect().await;
            result
        }

        Command::SetAway { connection, state, timeout } => {
            let bridge = connected_bridge(&connection).await?;
            let result = bridge
                .set_away(state.enabled(), timeout.map(Duration::from_secs))
                .await;
            bridge.disconnect().await;
            result
        }

        Command::SetComfocool { connection, mode } => {
            let bridge = connected_bridge(&connection).await?;
            let mode = match mode {
                cli::ComfoCoolArg::Auto => ComfoCoolMode::Auto,
                cli::ComfoCoolArg::Off => ComfoCoolMode::Off,
            };
            let result = bridge.set_comfocool(mode).await;
            bridge.disconnect().await;
            result
        }

        Command::SetTemperatureProfile { connection, profile } => {
            let bridge = connected_bridge(&connection).await?;
            let profile = match profile {
                cli::TemperatureProfileArg::Warm => TemperatureProfile::Warm,
                cli::TemperatureProfileArg::Normal => TemperatureProfile::Normal,
                cli::TemperatureProfileArg::Cool => TemperatureProfile::Cool,
            };
            let result = bridge.set_temperature_profile(profile).await;
            bridge.disconnect().await;
            result
        }

        Command::ShowSensors { connection } => {
            let bridge = connected_bridge(&connection).await?;
            for sensor in bridge.show_sensors() {
                match sensor.unit {
                    Some(unit) => println!("{}\t{}\t{}", sensor.pdid, sensor.name, unit),
                    None => println!("{}\t{}", sensor.pdid, sensor.name),
                }
            }
            bridge.disconnect().await;
            Ok(())
        }

        Command::ShowSensor { connection, pdid, follow } => {
            let bridge = connected_bridge(&connection).await?;
            let type_tag = comfoconnect::sensors::lookup(pdid)
                .map(|entry| entry.type_tag)
                .unwrap_or(comfoconnect_wire::TypeTag::I16);

            if follow {
                let mut rx = bridge.show_sensor_follow(pdid, type_tag).await?;
                loop {
                    tokio::select! {
                        sample = rx.recv() => match sample {
                            Some(sample) => println!("{:?}", sample.value),
                            None => break,
                        },
                        _ = tokio::signal::ctrl_c() => {
                            log::info!("ctrl-c received, unsubscribing");
                            break;
                        }
                    }
                }
            } else {
                let value = bridge.show_sensor_once(pdid, type_tag).await?;
                println!("{value:?}");
            }

            bridge.disconnect().await;
            Ok(())
        }

        Command::GetProperty { connection, unit, subunit, property, type_tag } => {
            let bridge = connected_bridge(&connection).await?;
            let result = bridge
                .get_property(unit, subunit, property, type_tag.into())
                .await;
            bridge.disconnect().await;

            match result {
                Ok(value) => {
                    println!("{value:?}");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
    }
}
