//! App actor - message loop processing UI events and broker events

use tokio::sync::mpsc;

use crate::app::session::EditOp;
use crate::app::state::AppState;
use crate::messages::{BrokerCommand, BrokerEvent, RenderState, UiEvent};

/// App actor that processes UI events and broker events
pub struct AppActor {
    state: AppState,
    network_tx: mpsc::UnboundedSender<BrokerCommand>,
    render_tx: mpsc::UnboundedSender<RenderState>,
}

impl AppActor {
    pub fn new(
        state: AppState,
        network_tx: mpsc::UnboundedSender<BrokerCommand>,
        render_tx: mpsc::UnboundedSender<RenderState>,
    ) -> Self {
        AppActor {
            state,
            network_tx,
            render_tx,
        }
    }

    /// Run the actor message loop
    pub async fn run(
        mut self,
        mut ui_rx: mpsc::UnboundedReceiver<UiEvent>,
        mut net_rx: mpsc::UnboundedReceiver<BrokerEvent>,
    ) {
        // Send initial render state
        let _ = self.render_tx.send(self.state.to_render_state());

        loop {
            tokio::select! {
                Some(event) = ui_rx.recv() => {
                    if self.handle_ui_event(event) {
                        // Quit: tear the session down before leaving
                        let _ = self.network_tx.send(BrokerCommand::Shutdown);
                        break;
                    }
                    let _ = self.render_tx.send(self.state.to_render_state());
                }
                Some(event) = net_rx.recv() => {
                    self.state.handle_broker_event(event);
                    let _ = self.render_tx.send(self.state.to_render_state());
                }
                else => break,
            }
        }
    }

    /// Handle a UI event, returns true if quit was requested
    fn handle_ui_event(&mut self, event: UiEvent) -> bool {
        let commands = match event {
            // Session intents
            UiEvent::Connect => self.state.connect(),
            UiEvent::Disconnect => self.state.disconnect(),
            UiEvent::Subscribe => self.state.subscribe(),
            UiEvent::Unsubscribe => self.state.unsubscribe(),
            UiEvent::Publish => self.state.publish(),
            UiEvent::Submit => self.state.submit(),

            // Field navigation and editing
            UiEvent::NextField => {
                self.state.next_field();
                Vec::new()
            }
            UiEvent::PrevField => {
                self.state.prev_field();
                Vec::new()
            }
            UiEvent::StartEditing => {
                self.state.start_editing();
                Vec::new()
            }
            UiEvent::StopEditing => {
                self.state.stop_editing();
                Vec::new()
            }
            UiEvent::CharInput(c) => {
                self.state.edit(EditOp::Insert(c));
                Vec::new()
            }
            UiEvent::Backspace => {
                self.state.edit(EditOp::Backspace);
                Vec::new()
            }
            UiEvent::CursorLeft => {
                self.state.edit(EditOp::Left);
                Vec::new()
            }
            UiEvent::CursorRight => {
                self.state.edit(EditOp::Right);
                Vec::new()
            }

            // Message log
            UiEvent::ScrollUp => {
                self.state.scroll_up();
                Vec::new()
            }
            UiEvent::ScrollDown => {
                self.state.scroll_down();
                Vec::new()
            }

            // Popups
            UiEvent::ToggleHelp => {
                self.state.toggle_help();
                Vec::new()
            }
            UiEvent::CloseHelp => {
                self.state.close_help();
                Vec::new()
            }

            // System
            UiEvent::Quit => return true,
        };

        for cmd in commands {
            let _ = self.network_tx.send(cmd);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::SessionStatus;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_connect_then_quit_sends_shutdown() {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (_net_tx, net_rx) = mpsc::unbounded_channel();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (render_tx, mut render_rx) = mpsc::unbounded_channel();

        let actor = AppActor::new(AppState::new(&Config::default()), cmd_tx, render_tx);
        let handle = tokio::spawn(actor.run(ui_rx, net_rx));

        ui_tx.send(UiEvent::Connect).unwrap();
        ui_tx.send(UiEvent::Quit).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

        assert!(matches!(cmd_rx.recv().await, Some(BrokerCommand::Connect { .. })));
        assert_eq!(cmd_rx.recv().await, Some(BrokerCommand::Shutdown));

        let initial = render_rx.recv().await.unwrap();
        assert_eq!(initial.status, SessionStatus::Disconnected);
        let after_connect = render_rx.recv().await.unwrap();
        assert_eq!(after_connect.status, SessionStatus::Connecting);
    }
}
