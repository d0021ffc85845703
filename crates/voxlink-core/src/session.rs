//! Per-client session state.
//!
//! [`Session`] consumes [`SessionEvent`]s (local input, decoded peer messages,
//! subscription and clock ticks), drives the drawing engine, and reports what
//! else has to happen as [`Effect`]s. It never touches the channel itself.

use crate::config::SessionConfig;
use crate::engine::{DragMode, DrawingEngine, SliceType};
use crate::export::{drawing_filename, screenshot_filename};
use crate::input::{KeyEvent, PointerEvent, WheelEvent};
use crate::join::{Instant, JoinState, JoinSynchronizer, JoinTimeout, SnapshotOutcome};
use crate::protocol::{ProtocolMessage, SyncRequest, SyncSnapshot, ViewChange, WheelScroll};
use crate::replay::replay_stroke;
use crate::shortcuts::{Action, ShortcutRegistry};
use crate::stroke::{DrawHistory, PenLabel, Stroke, VoxelPoint};
use crate::tools::{DrawingMode, StrokeCapture, ToolManager};

/// Input to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The engine reported the voxel under the pointer.
    LocationChanged(VoxelPoint),
    Pointer(PointerEvent),
    Key(KeyEvent),
    Wheel(WheelEvent),
    /// Pen color picked in the palette.
    SelectColor(PenLabel),
    SetOpacity(f32),
    SetFilled(bool),
    /// The channel subscription was (re)confirmed.
    Subscribed { now: Instant },
    /// A decoded message from a peer.
    Remote(ProtocolMessage),
    /// Clock tick for the join wait.
    Tick { now: Instant },
}

/// Notifications for the host's user interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiEffect {
    ShowLoading,
    HideLoading,
    ModeChanged(DrawingMode),
    DragModeChanged(DragMode),
    OpacityChanged(f32),
}

/// Work left to the caller after handling an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Broadcast to the other clients.
    Send(ProtocolMessage),
    Ui(UiEffect),
}

pub struct Session {
    history: DrawHistory,
    view: SliceType,
    tools: ToolManager,
    capture: StrokeCapture,
    join: JoinSynchronizer,
    scroll_step: f64,
    draw_opacity: f32,
    volume_url: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            history: DrawHistory::new(),
            view: SliceType::default(),
            tools: ToolManager::new(config.initial_pen),
            capture: StrokeCapture::new(),
            join: JoinSynchronizer::new(config.join_timeout()),
            scroll_step: config.scroll_step,
            draw_opacity: config.draw_opacity,
            volume_url: config.volume_url.clone(),
        }
    }

    /// Push the initial pen and opacity to the engine.
    pub fn install<E: DrawingEngine + ?Sized>(&self, engine: &mut E) {
        self.tools.install(engine);
        engine.set_draw_opacity(self.draw_opacity);
    }

    pub fn history(&self) -> &DrawHistory {
        &self.history
    }

    pub fn view(&self) -> SliceType {
        self.view
    }

    pub fn mode(&self) -> DrawingMode {
        self.tools.mode()
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn join_state(&self) -> JoinState {
        self.join.state()
    }

    pub fn draw_opacity(&self) -> f32 {
        self.draw_opacity
    }

    pub fn volume_url(&self) -> Option<&str> {
        self.volume_url.as_deref()
    }

    pub fn set_volume_url(&mut self, url: Option<String>) {
        self.volume_url = url;
    }

    /// Handle one event.
    pub fn handle<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::LocationChanged(voxel) => {
                self.capture.set_position(voxel);
                Vec::new()
            }
            SessionEvent::Pointer(pointer) => self.handle_pointer(engine, pointer),
            SessionEvent::Key(key) => self.handle_key(engine, &key),
            // The viewer scrolls itself; only the peers need telling.
            SessionEvent::Wheel(wheel) => vec![Effect::Send(ProtocolMessage::Wheel(WheelScroll::from(wheel)))],
            SessionEvent::SelectColor(color) => {
                let mode = self.tools.select_color(engine, color);
                vec![Effect::Ui(UiEffect::ModeChanged(mode))]
            }
            SessionEvent::SetOpacity(opacity) => {
                self.draw_opacity = opacity;
                engine.set_draw_opacity(opacity);
                vec![Effect::Ui(UiEffect::OpacityChanged(opacity))]
            }
            SessionEvent::SetFilled(filled) => {
                self.tools.set_filled(engine, filled);
                Vec::new()
            }
            SessionEvent::Subscribed { now } => {
                let request = self.join.on_subscribed(now);
                log::info!("Subscribed; requesting session state from peers");
                vec![
                    Effect::Ui(UiEffect::ShowLoading),
                    Effect::Send(ProtocolMessage::SyncRequest(request)),
                ]
            }
            SessionEvent::Remote(msg) => self.handle_remote(engine, msg),
            SessionEvent::Tick { now } => match self.join.poll_timeout(now) {
                Some(JoinTimeout::Promoted) => vec![Effect::Ui(UiEffect::HideLoading)],
                Some(JoinTimeout::AlreadySynced) | None => Vec::new(),
            },
        }
    }

    fn handle_pointer<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E, pointer: PointerEvent) -> Vec<Effect> {
        match pointer {
            PointerEvent::Move { buttons_down } => {
                self.tools.observe_pen(engine);
                self.capture.pointer_move(engine, buttons_down, self.tools.is_filled());
                Vec::new()
            }
            PointerEvent::Up => {
                engine.refresh_drawing();
                match self.capture.pointer_up(engine, self.tools.is_filled()) {
                    Some(stroke) => {
                        log::debug!("Captured stroke: {} points, label {}", stroke.len(), stroke.label);
                        self.history.push(stroke.clone());
                        vec![Effect::Send(ProtocolMessage::Stroke(stroke))]
                    }
                    None => Vec::new(),
                }
            }
        }
    }

    fn handle_key<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E, key: &KeyEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(action) = ShortcutRegistry::lookup(key) {
            log::debug!("Shortcut {:?}", action);
            match action {
                Action::ToggleDrawing => {
                    let mode = self.tools.toggle_drawing(engine);
                    effects.push(Effect::Ui(UiEffect::ModeChanged(mode)));
                }
                Action::ToggleErasing => {
                    let mode = self.tools.toggle_erasing(engine);
                    effects.push(Effect::Ui(UiEffect::ModeChanged(mode)));
                }
                Action::CycleView => {
                    self.view = self.view.next();
                    engine.set_slice_type(self.view);
                    effects.push(Effect::Send(ProtocolMessage::ViewChange(ViewChange {
                        view_number: self.view,
                    })));
                }
                Action::Undo => {
                    self.undo(engine);
                    effects.push(Effect::Send(ProtocolMessage::Undo));
                }
                Action::SaveDrawing => {
                    let filename = drawing_filename(self.volume_url.as_deref());
                    log::info!("Saving drawing to {}", filename);
                    engine.save_document(&filename);
                }
                Action::SaveScreenshot => {
                    let filename = screenshot_filename(self.volume_url.as_deref());
                    log::info!("Saving screenshot to {}", filename);
                    engine.save_scene(&filename);
                }
                Action::SetDragMode(mode) => {
                    self.tools.set_drag_mode(engine, mode);
                    effects.push(Effect::Ui(UiEffect::DragModeChanged(mode)));
                }
            }
        }
        engine.update_gl_volume();
        effects
    }

    fn handle_remote<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E, msg: ProtocolMessage) -> Vec<Effect> {
        match msg {
            ProtocolMessage::Stroke(stroke) => {
                self.apply_remote_stroke(engine, stroke);
                Vec::new()
            }
            ProtocolMessage::ViewChange(change) => {
                self.view = change.view_number;
                engine.set_slice_type(change.view_number);
                Vec::new()
            }
            ProtocolMessage::Wheel(wheel) => {
                let (x, y) = wheel.canvas_offset();
                engine.slice_scroll_2d(wheel.scroll_amount(self.scroll_step), x, y);
                Vec::new()
            }
            ProtocolMessage::Undo => {
                self.undo(engine);
                Vec::new()
            }
            ProtocolMessage::SyncRequest(request) => self.answer_sync_request(engine, request),
            ProtocolMessage::SyncSnapshot(snapshot) => self.apply_snapshot(engine, &snapshot),
        }
    }

    fn apply_remote_stroke<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E, stroke: Stroke) {
        if stroke.is_empty() {
            log::warn!("Ignoring stroke without points");
            return;
        }
        let segments = replay_stroke(engine, &stroke);
        log::debug!("Replayed remote stroke: {} segments, label {}", segments, stroke.label);
        self.history.push(stroke);
        if !self.tools.mode().is_active() {
            engine.set_drawing_enabled(false);
        }
    }

    fn undo<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E) {
        self.history.pop();
        engine.draw_undo();
    }

    fn answer_sync_request<E: DrawingEngine + ?Sized>(&self, engine: &E, request: SyncRequest) -> Vec<Effect> {
        if !self.join.should_answer(&request) {
            log::debug!("Not answering sync request (state {:?})", self.join.state());
            return Vec::new();
        }
        let snapshot = JoinSynchronizer::snapshot(engine, &self.history, self.view);
        log::info!("Answering sync request with {} strokes", snapshot.current_draw_data.len());
        vec![Effect::Send(ProtocolMessage::SyncSnapshot(snapshot))]
    }

    fn apply_snapshot<E: DrawingEngine + ?Sized>(&mut self, engine: &mut E, snapshot: &SyncSnapshot) -> Vec<Effect> {
        match self.join.apply_snapshot(engine, &mut self.history, &mut self.view, snapshot) {
            SnapshotOutcome::Applied { .. } => vec![Effect::Ui(UiEffect::HideLoading)],
            SnapshotOutcome::Ignored => {
                log::debug!("Ignoring snapshot; already synced");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, HeadlessEngine};
    use crate::input::Modifiers;
    use crate::join::Duration;
    use crate::protocol::{CanvasInfo, MouseArgs};

    fn key(name: &str) -> SessionEvent {
        SessionEvent::Key(KeyEvent::new(name, Modifiers::NONE))
    }

    fn ctrl(name: &str) -> SessionEvent {
        SessionEvent::Key(KeyEvent::new(name, Modifiers::CTRL))
    }

    fn stroke(points: &[VoxelPoint], label: u8) -> Stroke {
        Stroke::new(points.to_vec(), PenLabel(label), false)
    }

    /// Draw `points` locally and return the effects of releasing the pointer.
    fn draw(session: &mut Session, engine: &mut HeadlessEngine, points: &[VoxelPoint]) -> Vec<Effect> {
        for point in points {
            session.handle(engine, SessionEvent::LocationChanged(*point));
            session.handle(engine, SessionEvent::Pointer(PointerEvent::Move { buttons_down: true }));
        }
        session.handle(engine, SessionEvent::Pointer(PointerEvent::Up))
    }

    fn synced_session(engine: &mut HeadlessEngine) -> Session {
        let mut session = Session::default();
        let now = Instant::now();
        session.handle(engine, SessionEvent::Subscribed { now });
        session.handle(engine, SessionEvent::Tick { now: now + Duration::from_secs(3) });
        session
    }

    #[test]
    fn test_local_stroke_is_recorded_and_sent() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        session.handle(&mut engine, key("D"));

        let points = [[1.0, 1.0, 1.0], [2.0, 1.0, 1.0], [2.0, 2.0, 1.0]];
        let effects = draw(&mut session, &mut engine, &points);

        let expected = stroke(&points, 1);
        assert_eq!(effects, vec![Effect::Send(ProtocolMessage::Stroke(expected.clone()))]);
        assert_eq!(session.history().as_slice(), &[expected]);
        assert!(engine.calls().contains(&EngineCall::RefreshDrawing));
    }

    #[test]
    fn test_no_stroke_when_drawing_is_off() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();

        let effects = draw(&mut session, &mut engine, &[[1.0, 1.0, 1.0], [2.0, 1.0, 1.0]]);
        assert!(effects.is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_local_and_remote_replay_match() {
        let points = [[1.0, 1.0, 1.0], [2.0, 1.0, 1.0], [2.0, 2.0, 1.0]];

        let mut local_engine = HeadlessEngine::new();
        let mut local = Session::default();
        local.handle(&mut local_engine, key("D"));
        let effects = draw(&mut local, &mut local_engine, &points);
        let Some(Effect::Send(ProtocolMessage::Stroke(captured))) = effects.into_iter().next() else {
            panic!("Expected a stroke");
        };
        let mut replay_engine = HeadlessEngine::new();
        replay_stroke(&mut replay_engine, &captured);

        let mut remote_engine = HeadlessEngine::new();
        let mut remote = Session::default();
        remote.handle(
            &mut remote_engine,
            SessionEvent::Remote(ProtocolMessage::Stroke(stroke(&points, 1))),
        );

        assert_eq!(replay_engine.line_calls(), remote_engine.line_calls());
    }

    #[test]
    fn test_remote_stroke_leaves_inactive_engine_disabled() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        let msg = ProtocolMessage::Stroke(stroke(&[[0.0; 3], [1.0, 0.0, 0.0]], 3));

        session.handle(&mut engine, SessionEvent::Remote(msg.clone()));
        assert!(!engine.is_drawing_enabled());
        assert_eq!(session.history().len(), 1);

        session.handle(&mut engine, key("D"));
        session.handle(&mut engine, SessionEvent::Remote(msg));
        assert!(engine.is_drawing_enabled());
    }

    #[test]
    fn test_undo_is_lifo() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        for label in [1, 2, 3] {
            let msg = ProtocolMessage::Stroke(stroke(&[[0.0; 3], [label as f64, 0.0, 0.0]], label));
            session.handle(&mut engine, SessionEvent::Remote(msg));
        }

        session.handle(&mut engine, SessionEvent::Remote(ProtocolMessage::Undo));
        let effects = session.handle(&mut engine, ctrl("Z"));

        assert_eq!(effects, vec![Effect::Send(ProtocolMessage::Undo)]);
        let labels: Vec<u8> = session.history().iter().map(|s| s.label.0).collect();
        assert_eq!(labels, vec![1]);
        assert_eq!(engine.committed_units(), 1);
    }

    #[test]
    fn test_undo_on_empty_history() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        session.handle(&mut engine, SessionEvent::Remote(ProtocolMessage::Undo));
        assert!(session.history().is_empty());
        assert_eq!(engine.calls(), &[EngineCall::DrawUndo]);
    }

    #[test]
    fn test_remote_wheel_scrolls_at_canvas_offset() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        let wheel = |delta_y| {
            SessionEvent::Remote(ProtocolMessage::Wheel(WheelScroll {
                mouse_args: MouseArgs { delta_y, client_x: 110.0, client_y: 60.0 },
                canvas_info: CanvasInfo { left: 10.0, top: 20.0 },
            }))
        };

        session.handle(&mut engine, wheel(-5.0));
        session.handle(&mut engine, wheel(5.0));

        assert_eq!(
            engine.calls(),
            &[
                EngineCall::SliceScroll2d(-0.01, 100.0, 40.0),
                EngineCall::SliceScroll2d(0.01, 100.0, 40.0),
            ]
        );
    }

    #[test]
    fn test_local_wheel_is_broadcast_only() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        let wheel = WheelEvent {
            delta_y: -5.0,
            client_x: 110.0,
            client_y: 60.0,
            canvas_left: 10.0,
            canvas_top: 20.0,
        };

        let effects = session.handle(&mut engine, SessionEvent::Wheel(wheel));
        assert_eq!(effects, vec![Effect::Send(ProtocolMessage::Wheel(WheelScroll::from(wheel)))]);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_space_cycles_view_and_broadcasts() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();

        let effects = session.handle(&mut engine, key("Space"));

        assert_eq!(session.view(), SliceType::Coronal);
        assert_eq!(engine.slice_type(), SliceType::Coronal);
        assert_eq!(
            effects,
            vec![Effect::Send(ProtocolMessage::ViewChange(ViewChange { view_number: SliceType::Coronal }))]
        );
        assert_eq!(engine.calls().last(), Some(&EngineCall::UpdateGlVolume));
    }

    #[test]
    fn test_remote_view_change() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        let msg = ProtocolMessage::ViewChange(ViewChange { view_number: SliceType::Render });

        session.handle(&mut engine, SessionEvent::Remote(msg));
        assert_eq!(session.view(), SliceType::Render);
        assert_eq!(engine.slice_type(), SliceType::Render);
    }

    #[test]
    fn test_every_key_updates_volume() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();

        let effects = session.handle(&mut engine, key("Q"));
        assert!(effects.is_empty());
        assert_eq!(engine.calls(), &[EngineCall::UpdateGlVolume]);
    }

    #[test]
    fn test_mode_keys_report_changes() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();

        assert_eq!(
            session.handle(&mut engine, key("D")),
            vec![Effect::Ui(UiEffect::ModeChanged(DrawingMode::Draw(PenLabel::RED)))]
        );
        assert_eq!(
            session.handle(&mut engine, key("E")),
            vec![Effect::Ui(UiEffect::ModeChanged(DrawingMode::Erase))]
        );
        assert_eq!(
            session.handle(&mut engine, SessionEvent::SelectColor(PenLabel(2))),
            vec![Effect::Ui(UiEffect::ModeChanged(DrawingMode::Draw(PenLabel(2))))]
        );
        assert_eq!(
            session.handle(&mut engine, key("1")),
            vec![Effect::Ui(UiEffect::DragModeChanged(DragMode::Pan))]
        );
        assert_eq!(engine.drag_mode(), DragMode::Pan);
    }

    #[test]
    fn test_export_uses_volume_stem() {
        let mut engine = HeadlessEngine::new();
        let config = SessionConfig {
            volume_url: Some("https://x.org/images/visiblehuman.nii.gz".to_string()),
            ..Default::default()
        };
        let mut session = Session::new(&config);

        session.handle(&mut engine, ctrl("Y"));
        session.handle(&mut engine, ctrl("B"));

        assert!(engine.calls().contains(&EngineCall::SaveDocument("visiblehuman.drawing.nvd".to_string())));
        assert!(engine.calls().contains(&EngineCall::SaveScene("visiblehuman.png".to_string())));
    }

    #[test]
    fn test_opacity_and_fill() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        session.install(&mut engine);
        assert_eq!(engine.draw_opacity(), 0.8);

        let effects = session.handle(&mut engine, SessionEvent::SetOpacity(0.5));
        assert_eq!(effects, vec![Effect::Ui(UiEffect::OpacityChanged(0.5))]);
        assert_eq!(engine.draw_opacity(), 0.5);

        session.handle(&mut engine, SessionEvent::SetFilled(true));
        assert!(engine.is_filled());
        assert!(session.tools().is_filled());
    }

    #[test]
    fn test_subscription_requests_state() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();

        let effects = session.handle(&mut engine, SessionEvent::Subscribed { now: Instant::now() });
        assert_eq!(
            effects,
            vec![
                Effect::Ui(UiEffect::ShowLoading),
                Effect::Send(ProtocolMessage::SyncRequest(SyncRequest { is_needed: true })),
            ]
        );
        assert_eq!(session.join_state(), JoinState::New);
    }

    #[test]
    fn test_new_client_ignores_sync_request() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        session.handle(&mut engine, SessionEvent::Subscribed { now: Instant::now() });

        let request = SessionEvent::Remote(ProtocolMessage::SyncRequest(SyncRequest { is_needed: true }));
        assert!(session.handle(&mut engine, request).is_empty());
    }

    #[test]
    fn test_synced_client_answers_sync_request() {
        let mut engine = HeadlessEngine::new();
        let mut session = synced_session(&mut engine);
        let msg = ProtocolMessage::Stroke(stroke(&[[0.0; 3], [1.0, 0.0, 0.0]], 2));
        session.handle(&mut engine, SessionEvent::Remote(msg));

        let request = SessionEvent::Remote(ProtocolMessage::SyncRequest(SyncRequest { is_needed: true }));
        let effects = session.handle(&mut engine, request);

        let [Effect::Send(ProtocolMessage::SyncSnapshot(snapshot))] = effects.as_slice() else {
            panic!("Expected a snapshot, got {:?}", effects);
        };
        assert_eq!(snapshot.current_draw_data.len(), 1);
        assert_eq!(snapshot.view, Some(SliceType::Axial));
    }

    #[test]
    fn test_join_timeout_hides_loading_once() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        let now = Instant::now();
        session.handle(&mut engine, SessionEvent::Subscribed { now });

        assert!(session.handle(&mut engine, SessionEvent::Tick { now }).is_empty());
        let later = now + Duration::from_secs(2);
        assert_eq!(
            session.handle(&mut engine, SessionEvent::Tick { now: later }),
            vec![Effect::Ui(UiEffect::HideLoading)]
        );
        assert!(session.handle(&mut engine, SessionEvent::Tick { now: later }).is_empty());
        assert_eq!(session.join_state(), JoinState::Synced);
    }

    #[test]
    fn test_snapshot_applied_once() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        session.handle(&mut engine, SessionEvent::Subscribed { now: Instant::now() });
        let snapshot = SyncSnapshot {
            current_draw_data: vec![stroke(&[[0.0; 3], [1.0, 0.0, 0.0]], 2)],
            view: Some(SliceType::Sagittal),
            this_mm: None,
        };

        let first = session.handle(&mut engine, SessionEvent::Remote(ProtocolMessage::SyncSnapshot(snapshot.clone())));
        let second = session.handle(&mut engine, SessionEvent::Remote(ProtocolMessage::SyncSnapshot(snapshot)));

        assert_eq!(first, vec![Effect::Ui(UiEffect::HideLoading)]);
        assert!(second.is_empty());
        assert_eq!(session.history().len(), 1);
        assert_eq!(engine.line_calls().len(), 1);
        assert_eq!(session.view(), SliceType::Sagittal);
    }

    #[test]
    fn test_remote_stroke_during_join_survives_snapshot() {
        let mut engine = HeadlessEngine::new();
        let mut session = Session::default();
        session.handle(&mut engine, SessionEvent::Subscribed { now: Instant::now() });

        let late = stroke(&[[5.0, 5.0, 0.0], [6.0, 5.0, 0.0]], 3);
        session.handle(&mut engine, SessionEvent::Remote(ProtocolMessage::Stroke(late.clone())));

        let earlier = vec![
            stroke(&[[0.0; 3], [1.0, 0.0, 0.0]], 1),
            stroke(&[[0.0, 1.0, 0.0], [1.0, 1.0, 0.0]], 2),
        ];
        let snapshot = SyncSnapshot {
            current_draw_data: earlier.clone(),
            view: None,
            this_mm: None,
        };
        session.handle(&mut engine, SessionEvent::Remote(ProtocolMessage::SyncSnapshot(snapshot)));

        let labels: Vec<u8> = session.history().iter().map(|s| s.label.0).collect();
        assert_eq!(labels, vec![1, 2, 3]);
        assert_eq!(engine.committed_units(), 3);

        session.handle(&mut engine, ctrl("Z"));
        assert_eq!(session.history().as_slice(), earlier.as_slice());
        assert_eq!(engine.committed_units(), 2);
    }
}
