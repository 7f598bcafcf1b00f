use ble_starter::domain::models::{UiEvent, UserCommand};
use ble_starter::domain::settings::SettingsService;
use ble_starter::infrastructure::bluetooth::simulated::SimulatedPlatform;
use ble_starter::infrastructure::bluetooth::{BluetoothService, Orchestrator};
use ble_starter::infrastructure::logging;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const STEP_DELAY: Duration = Duration::from_millis(50);

/// Walks the core through one browse/connect/disconnect cycle against the
/// simulated platform.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new().unwrap_or_else(|e| {
        eprintln!("Falling back to local settings file: {}", e);
        SettingsService::with_path("settings.json".into())
    });
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting BLE starter demo");

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();

    let platform = SimulatedPlatform::new(event_tx);
    platform.set_radio_enabled(false);
    platform.set_enable_on_prompt(true);
    platform.set_grant_on_request(true);
    platform.set_auto_accept(true);

    let orchestrator = Orchestrator::new(platform.clone(), &settings, ui_tx);
    let service = tokio::spawn(BluetoothService::new(orchestrator).run(command_rx, event_rx));

    let ui = tokio::spawn(async move {
        while let Some(event) = ui_rx.recv().await {
            match event {
                UiEvent::Ready(handle) => info!("UI: session ready with {}", handle.address),
                UiEvent::Lost(identity) => warn!(
                    "UI: disconnected or unable to connect to {}",
                    identity.display_name()
                ),
                UiEvent::Failure(e) => warn!("UI: {}", e),
                UiEvent::LogMessage(status) => info!("UI: {}", status.message),
                other => info!("UI: {:?}", other),
            }
        }
    });

    // The first toggle asks for permissions and the adapter; the second scans.
    let steps = [
        UserCommand::Activate,
        UserCommand::ToggleScan,
        UserCommand::ToggleScan,
    ];
    for command in steps {
        command_tx.send(command)?;
        tokio::time::sleep(STEP_DELAY).await;
    }

    platform.advertise("C4:64:E3:01:02:03", Some("Proteus-III"), -48, &[0x02, 0x01, 0x06]);
    platform.advertise("F0:9E:9E:AA:BB:CC", None, -71, &[0x05, 0x09, b'B', b'M', b'7', b'0']);
    platform.advertise("C4:64:E3:01:02:03", Some("Proteus-III"), -45, &[0x02, 0x01, 0x06]);
    tokio::time::sleep(STEP_DELAY).await;

    for command in [UserCommand::SelectDevice(0), UserCommand::Disconnect] {
        command_tx.send(command)?;
        tokio::time::sleep(STEP_DELAY).await;
    }

    command_tx.send(UserCommand::Deactivate)?;
    drop(command_tx);

    let orchestrator = service.await?;
    info!(
        "Demo finished in state {:?} with {} device(s) discovered",
        orchestrator.state(),
        orchestrator.devices().len()
    );
    drop(orchestrator);
    drop(platform);
    ui.await?;

    Ok(())
}
