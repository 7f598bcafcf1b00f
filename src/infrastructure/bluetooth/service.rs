//! Bluetooth Service Module
//!
//! Serialises host commands and platform callbacks onto the orchestrator.
//! Both arrive on their own channel; the loop handles one message at a
//! time, so the store and scan state are never mutated concurrently.

use crate::domain::models::UserCommand;
use crate::infrastructure::bluetooth::orchestrator::Orchestrator;
use crate::infrastructure::bluetooth::platform::{Platform, PlatformEvent};
use tokio::sync::mpsc;
use tracing::{info, trace};

pub struct BluetoothService<P: Platform> {
    orchestrator: Orchestrator<P>,
}

impl<P: Platform> BluetoothService<P> {
    pub fn new(orchestrator: Orchestrator<P>) -> Self {
        Self { orchestrator }
    }

    /// Run until the host closes the command channel, then finish any
    /// callbacks already queued and hand the orchestrator back.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<UserCommand>,
        mut events: mpsc::UnboundedReceiver<PlatformEvent>,
    ) -> Orchestrator<P> {
        info!("Bluetooth service started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.orchestrator.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.dispatch(event),
            }
        }

        while let Ok(event) = events.try_recv() {
            self.dispatch(event);
        }

        info!("Bluetooth service stopped");
        self.orchestrator
    }

    fn dispatch(&mut self, event: PlatformEvent) {
        trace!("Platform event: {:?}", event);
        self.orchestrator.handle_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{OrchestratorState, UiEvent};
    use crate::domain::permissions::Permission;
    use crate::domain::settings::Settings;
    use crate::infrastructure::bluetooth::simulated::SimulatedPlatform;

    #[tokio::test]
    async fn test_loop_stops_when_commands_close() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();

        let platform = SimulatedPlatform::new(event_tx.clone());
        platform.grant(&[Permission::BluetoothScan, Permission::BluetoothConnect]);
        let orchestrator = Orchestrator::new(platform.clone(), &Settings::default(), ui_tx);
        let service = tokio::spawn(BluetoothService::new(orchestrator).run(command_rx, event_rx));

        command_tx.send(UserCommand::Activate).unwrap();
        command_tx.send(UserCommand::ToggleScan).unwrap();
        drop(command_tx);

        let orchestrator = service.await.unwrap();
        assert!(orchestrator.scan().is_scanning());
        assert_eq!(orchestrator.state(), &OrchestratorState::Browsing);

        let mut saw_started = false;
        while let Ok(event) = ui_rx.try_recv() {
            saw_started |= event == UiEvent::ScanningStarted;
        }
        assert!(saw_started);
    }
}
