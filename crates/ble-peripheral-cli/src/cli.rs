//! Command-line interface definitions and parsing

use ble_peripheral_core::AdvertiseConfig;
use clap::{Args, Parser, Subcommand};

use crate::error::{CliError, Result};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (TOML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start advertising and keep going until interrupted
    Advertise {
        #[command(flatten)]
        advertise: AdvertiseArgs,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(short, long)]
        duration: Option<u64>,

        /// Use the in-memory stack instead of the platform Bluetooth stack
        #[arg(long)]
        simulate: bool,
    },
    /// Check whether the Bluetooth stack can advertise
    Check {
        /// Use the in-memory stack instead of the platform Bluetooth stack
        #[arg(long)]
        simulate: bool,
    },
    /// Print the effective configuration, settings and payload as JSON
    ShowConfig {
        #[command(flatten)]
        advertise: AdvertiseArgs,
    },
}

/// Advertise configuration overrides
#[derive(Args, Debug, Default, Clone)]
pub struct AdvertiseArgs {
    /// Primary service UUID
    #[arg(short, long)]
    pub uuid: Option<String>,

    /// UUID to attach service data under
    #[arg(long)]
    pub service_data_uuid: Option<String>,

    /// Service data bytes (hex)
    #[arg(long)]
    pub service_data: Option<String>,

    /// 16-bit manufacturer id
    #[arg(long)]
    pub manufacturer_id: Option<u16>,

    /// Manufacturer data bytes (hex)
    #[arg(long)]
    pub manufacturer_data: Option<String>,

    /// Include the device name in the advertisement
    #[arg(long)]
    pub include_device_name: bool,

    /// Include the TX power level in the advertisement
    #[arg(long)]
    pub include_tx_power: bool,

    /// Clear previously registered GATT services first
    #[arg(long)]
    pub remove_all_services: bool,
}

impl AdvertiseArgs {
    /// Overlay these arguments on a configuration loaded from file
    pub fn apply(&self, base: Option<AdvertiseConfig>) -> Result<AdvertiseConfig> {
        let mut config = match (&self.uuid, base) {
            (Some(uuid), Some(base)) => AdvertiseConfig {
                uuid: AdvertiseConfig::parse_uuid(uuid)?,
                ..base
            },
            (Some(uuid), None) => AdvertiseConfig::new(uuid)?,
            (None, Some(base)) => base,
            (None, None) => {
                return Err(CliError::Config(
                    "no service UUID given; use --uuid or a config file".into(),
                ))
            }
        };

        if let Some(uuid) = &self.service_data_uuid {
            config.service_data_uuid = Some(AdvertiseConfig::parse_uuid(uuid)?);
        }
        if let Some(data) = &self.service_data {
            config.service_data = Some(decode_hex_values(data)?);
        }
        if let Some(id) = self.manufacturer_id {
            config.manufacturer_id = Some(id);
        }
        if let Some(data) = &self.manufacturer_data {
            config.manufacturer_data = Some(decode_hex_values(data)?);
        }
        if self.include_device_name {
            config.include_device_name = Some(true);
        }
        if self.include_tx_power {
            config.transmission_power_included = Some(true);
        }
        if self.remove_all_services {
            config.remove_all_services = Some(true);
        }
        Ok(config)
    }
}

fn decode_hex_values(data: &str) -> Result<Vec<i32>> {
    Ok(hex::decode(data)?.into_iter().map(i32::from).collect())
}
