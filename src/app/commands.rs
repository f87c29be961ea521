//! Command handlers - AppState methods for processing UI events and broker events

use crate::app::session::{EditOp, SessionEvent};
use crate::app::state::AppState;
use crate::messages::ui_events::InputMode;
use crate::messages::{BrokerCommand, BrokerEvent};
use crate::models::DraftField;

impl AppState {
    /// Run one event through the session and hand back its commands
    pub fn dispatch(&mut self, event: SessionEvent) -> Vec<BrokerCommand> {
        let transition = std::mem::take(&mut self.session).apply(event);
        self.session = transition.session;
        transition.commands
    }

    pub fn handle_broker_event(&mut self, event: BrokerEvent) {
        let is_message = matches!(event, BrokerEvent::Message { .. });
        self.dispatch(SessionEvent::Broker(event));
        // Keep the viewport pinned when scrolled back
        if is_message && self.log_scroll > 0 {
            self.log_scroll = self.log_scroll.saturating_add(1);
        }
    }

    // ========================================================================
    // Session intents
    // ========================================================================

    pub fn connect(&mut self) -> Vec<BrokerCommand> {
        self.dispatch(SessionEvent::Connect)
    }

    pub fn disconnect(&mut self) -> Vec<BrokerCommand> {
        self.dispatch(SessionEvent::Disconnect)
    }

    pub fn subscribe(&mut self) -> Vec<BrokerCommand> {
        self.log_scroll = 0;
        self.dispatch(SessionEvent::Subscribe)
    }

    pub fn unsubscribe(&mut self) -> Vec<BrokerCommand> {
        self.dispatch(SessionEvent::Unsubscribe)
    }

    pub fn publish(&mut self) -> Vec<BrokerCommand> {
        self.dispatch(SessionEvent::Publish)
    }

    /// Enter while editing: subscribe or publish depending on focus
    pub fn submit(&mut self) -> Vec<BrokerCommand> {
        match self.focus {
            DraftField::SubscribeSubject => {
                self.stop_editing();
                self.subscribe()
            }
            // Stays in edit mode so the next message can be typed right away
            DraftField::PublishPayload => self.publish(),
            DraftField::PublishSubject => {
                self.stop_editing();
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Field navigation and editing
    // ========================================================================

    pub fn next_field(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn prev_field(&mut self) {
        self.focus = self.focus.prev();
    }

    pub fn start_editing(&mut self) {
        self.input_mode = InputMode::Editing;
    }

    pub fn stop_editing(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn edit(&mut self, op: EditOp) {
        let field = self.focus;
        self.dispatch(SessionEvent::Edit { field, op });
    }

    // ========================================================================
    // Message log and popups
    // ========================================================================

    pub fn scroll_up(&mut self) {
        let max = self.session.log().len().min(u16::MAX as usize) as u16;
        if self.log_scroll < max {
            self.log_scroll += 1;
        }
    }

    pub fn scroll_down(&mut self) {
        self.log_scroll = self.log_scroll.saturating_sub(1);
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn close_help(&mut self) {
        self.show_help = false;
    }
}
