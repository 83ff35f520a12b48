//! Command execution

use std::time::Duration;

use ble_peripheral::create_platform_controller;
use ble_peripheral_core::{
    AdvertiseConfig, AdvertisePayload, AdvertiseSettings, NativeBluetoothStack,
    PeripheralController, SimulatedStack,
};
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, RuntimeConfig};
use crate::error::{CliError, Result};

/// Dispatches parsed commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Advertise {
                advertise,
                duration,
                simulate,
            } => {
                let advertise_config = advertise.apply(config.advertise)?;
                let runtime = RuntimeConfig {
                    simulate: simulate || config.runtime.simulate,
                    duration_secs: duration.or(config.runtime.duration_secs),
                    ..config.runtime
                };
                if runtime.simulate {
                    let controller = PeripheralController::new(SimulatedStack::new());
                    run_advertise(controller, &advertise_config, &runtime).await
                } else {
                    run_advertise(create_platform_controller(), &advertise_config, &runtime).await
                }
            }
            Commands::Check { simulate } => {
                if simulate || config.runtime.simulate {
                    run_check(PeripheralController::new(SimulatedStack::new())).await
                } else {
                    run_check(create_platform_controller()).await
                }
            }
            Commands::ShowConfig { advertise } => {
                let advertise_config = advertise.apply(config.advertise)?;
                println!("{}", render_config(&advertise_config)?);
                Ok(())
            }
        }
    }
}

/// Advertise until interrupted or until the configured duration elapses
pub async fn run_advertise<S: NativeBluetoothStack>(
    mut controller: PeripheralController<S>,
    config: &AdvertiseConfig,
    runtime: &RuntimeConfig,
) -> Result<()> {
    controller.initialize().await?;
    let request = controller.start(config).await?;
    info!("Requested advertising of {} ({})", config.uuid, request);

    let secs = runtime.start_timeout_secs;
    let outcome = match timeout(Duration::from_secs(secs), controller.await_start()).await {
        Ok(outcome) => outcome,
        Err(_) => {
            controller.stop().await?;
            return Err(CliError::StartTimeout { secs });
        }
    };
    match outcome {
        Ok(outcome) => info!("Advertising active ({:?})", outcome),
        Err(e) => {
            error!("Advertising failed: {}", e);
            if e.is_retryable() {
                warn!("The failure is transient; retrying later may succeed");
            }
            controller.stop().await?;
            return Err(e.into());
        }
    }

    let deadline = async {
        match runtime.duration_secs {
            Some(secs) => sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("Advertising duration elapsed");
                break;
            }
            callback = controller.next_callback() => {
                if callback.is_none() {
                    break;
                }
            }
        }
    }

    controller.stop().await?;
    info!("Advertising stopped");
    Ok(())
}

/// Initialize the stack and report whether advertising is possible
pub async fn run_check<S: NativeBluetoothStack>(mut controller: PeripheralController<S>) -> Result<()> {
    match controller.initialize().await {
        Ok(()) => {
            println!("BLE peripheral advertising available");
            Ok(())
        }
        Err(e) => {
            println!("BLE peripheral advertising unavailable: {}", e);
            Err(e.into())
        }
    }
}

/// Render configuration, fixed settings and the resulting payload as JSON
pub fn render_config(config: &AdvertiseConfig) -> Result<String> {
    let payload = AdvertisePayload::from_config(config)?;
    let rendered = serde_json::json!({
        "config": config,
        "settings": AdvertiseSettings::default(),
        "payload": payload,
    });
    Ok(serde_json::to_string_pretty(&rendered)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ble_peripheral_core::{AdvertiseFailure, StackCall, StartResponse};

    fn test_config() -> AdvertiseConfig {
        AdvertiseConfig::new("0000180d-0000-1000-8000-00805f9b34fb")
            .unwrap()
            .with_manufacturer_data(0x004C, vec![10, 255, 0])
    }

    fn short_runtime() -> RuntimeConfig {
        RuntimeConfig {
            start_timeout_secs: 1,
            simulate: true,
            duration_secs: Some(0),
        }
    }

    #[tokio::test]
    async fn test_run_advertise_starts_and_stops() {
        let stack = SimulatedStack::new();
        let controller = PeripheralController::new(stack.clone());

        run_advertise(controller, &test_config(), &short_runtime())
            .await
            .unwrap();

        let calls = stack.calls();
        assert!(calls
            .iter()
            .any(|c| matches!(c, StackCall::StartAdvertising { .. })));
        assert_eq!(calls.last(), Some(&StackCall::ClearServices));
        assert!(!stack.is_advertising());
    }

    #[tokio::test]
    async fn test_run_advertise_reports_failure() {
        let stack = SimulatedStack::new();
        stack.push_start_response(StartResponse::Failure(AdvertiseFailure::TOO_MANY_ADVERTISERS));
        let controller = PeripheralController::new(stack.clone());

        let err = run_advertise(controller, &test_config(), &short_runtime())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Peripheral(e) if e.is_retryable()));
        assert!(stack.services().is_empty());
    }

    #[tokio::test]
    async fn test_run_advertise_times_out() {
        let stack = SimulatedStack::new();
        stack.push_start_response(StartResponse::Deferred);
        let controller = PeripheralController::new(stack);

        let mut runtime = short_runtime();
        runtime.start_timeout_secs = 0;
        let err = run_advertise(controller, &test_config(), &runtime)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::StartTimeout { secs: 0 }));
    }

    #[tokio::test]
    async fn test_run_check() {
        assert!(run_check(PeripheralController::new(SimulatedStack::new()))
            .await
            .is_ok());
        assert!(run_check(PeripheralController::new(SimulatedStack::unavailable()))
            .await
            .is_err());
    }

    #[test]
    fn test_render_config() {
        let rendered = render_config(&test_config()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["config"]["manufacturerId"], 76);
        assert_eq!(value["settings"]["mode"], "Balanced");
        assert_eq!(value["payload"]["manufacturer_data"]["76"], serde_json::json!([10, 255, 0]));
    }
}
