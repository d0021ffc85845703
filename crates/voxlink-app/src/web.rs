//! WebAssembly bridge between a NiiVue viewer, a pusher-js channel and the
//! session controller.
//!
//! The page owns the viewer and the channel. It forwards DOM and channel
//! events to a [`Collaborator`], which reports UI changes back through a
//! callback:
//!
//! ```js
//! const collab = new Collaborator(nv, pusher.subscribe("private-cs410"), config, (n) => ui(n));
//! channel.bind("pusher:subscription_succeeded", () => collab.onSubscribed());
//! channel.bind_global((event, data) => collab.onChannelEvent(event, data));
//! nv.onLocationChange = (e) => collab.onLocationChange(e.vox);
//! setInterval(() => collab.tick(), 250);
//! ```

use crate::params::UrlParams;
use js_sys::{Array, Function, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use voxlink_core::config::SessionConfig;
use voxlink_core::engine::{DragMode, DrawingEngine, SliceType};
use voxlink_core::input::{KeyEvent, Modifiers, PointerEvent, WheelEvent};
use voxlink_core::palette::Palette;
use voxlink_core::stroke::{PenLabel, VoxelPoint};
use voxlink_core::sync::{Channel, ChannelError};
use voxlink_core::tools::DrawingMode;
use voxlink_core::{Instant, InteractionController, SessionEvent, UiEffect};

#[wasm_bindgen]
extern "C" {
    /// A NiiVue viewer instance.
    pub type Niivue;

    #[wasm_bindgen(method, getter)]
    fn opts(this: &Niivue) -> JsValue;

    #[wasm_bindgen(method, getter)]
    fn scene(this: &Niivue) -> JsValue;

    #[wasm_bindgen(method, getter, js_name = drawPenFillPts)]
    fn draw_pen_fill_pts(this: &Niivue) -> JsValue;

    #[wasm_bindgen(method, js_name = setDrawingEnabled)]
    fn set_drawing_enabled(this: &Niivue, enabled: bool);

    #[wasm_bindgen(method, js_name = setPenValue)]
    fn set_pen_value(this: &Niivue, value: f64, is_filled_pen: bool);

    #[wasm_bindgen(method, js_name = drawPenLine)]
    fn draw_pen_line(this: &Niivue, pt_a: &Array, pt_b: &Array, pen_value: f64);

    #[wasm_bindgen(method, js_name = drawUndo)]
    fn draw_undo(this: &Niivue);

    #[wasm_bindgen(method, js_name = drawAddUndoBitmap)]
    fn draw_add_undo_bitmap(this: &Niivue);

    #[wasm_bindgen(method, js_name = refreshDrawing)]
    fn refresh_drawing(this: &Niivue, is_force_redraw: bool);

    #[wasm_bindgen(method, js_name = setSliceType)]
    fn set_slice_type(this: &Niivue, slice_type: u8);

    #[wasm_bindgen(method, js_name = sliceScroll2D)]
    fn slice_scroll_2d(this: &Niivue, pos_change: f64, x: f64, y: f64);

    #[wasm_bindgen(method, js_name = mm2frac)]
    fn mm2frac(this: &Niivue, mm: &Array) -> JsValue;

    #[wasm_bindgen(method, js_name = frac2mm)]
    fn frac2mm(this: &Niivue, frac: &Array) -> JsValue;

    #[wasm_bindgen(method, js_name = drawScene)]
    fn draw_scene(this: &Niivue);

    #[wasm_bindgen(method, js_name = updateGLVolume)]
    fn update_gl_volume(this: &Niivue);

    #[wasm_bindgen(method, js_name = saveDocument)]
    fn save_document(this: &Niivue, filename: &str);

    #[wasm_bindgen(method, js_name = saveScene)]
    fn save_scene(this: &Niivue, filename: &str);

    /// A subscribed pusher-js channel.
    pub type PusherChannel;

    #[wasm_bindgen(method, catch)]
    fn trigger(this: &PusherChannel, event: &str, data: &JsValue) -> Result<bool, JsValue>;
}

// ============================================================================
// Viewer
// ============================================================================

/// NiiVue drag mode numbers.
fn drag_mode_number(mode: DragMode) -> u8 {
    match mode {
        DragMode::Slice => 0,
        DragMode::Measurement => 2,
        DragMode::Pan => 3,
    }
}

fn js_vec3(p: [f64; 3]) -> Array {
    p.iter().map(|v| JsValue::from_f64(*v)).collect()
}

/// Read the first three components of an array-like (typed arrays included).
fn vec3_from_js(value: &JsValue) -> [f64; 3] {
    let array = Array::from(value);
    std::array::from_fn(|i| array.get(i as u32).as_f64().unwrap_or(0.0))
}

fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

fn set(target: &JsValue, key: &str, value: &JsValue) {
    if let Err(e) = Reflect::set(target, &JsValue::from_str(key), value) {
        log::warn!("Failed to set {}: {:?}", key, e);
    }
}

/// [`DrawingEngine`] backed by a NiiVue instance.
pub struct NiivueEngine {
    nv: Niivue,
}

impl NiivueEngine {
    pub fn new(nv: Niivue) -> Self {
        Self { nv }
    }
}

impl DrawingEngine for NiivueEngine {
    fn set_drawing_enabled(&mut self, enabled: bool) {
        self.nv.set_drawing_enabled(enabled);
    }

    fn is_drawing_enabled(&self) -> bool {
        get(&self.nv.opts(), "drawingEnabled").as_bool().unwrap_or(false)
    }

    fn set_pen_value(&mut self, label: PenLabel, filled: bool) {
        self.nv.set_pen_value(f64::from(label.0), filled);
    }

    fn pen_value(&self) -> PenLabel {
        let value = get(&self.nv.opts(), "penValue").as_f64().unwrap_or(0.0);
        PenLabel(value.clamp(0.0, f64::from(u8::MAX)) as u8)
    }

    fn draw_pen_line(&mut self, from: VoxelPoint, to: VoxelPoint, label: PenLabel) {
        self.nv.draw_pen_line(&js_vec3(from), &js_vec3(to), f64::from(label.0));
    }

    fn pen_fill_points(&self) -> Vec<VoxelPoint> {
        Array::from(&self.nv.draw_pen_fill_pts())
            .iter()
            .map(|p| vec3_from_js(&p))
            .collect()
    }

    fn draw_undo(&mut self) {
        self.nv.draw_undo();
    }

    fn draw_add_undo_bitmap(&mut self) {
        self.nv.draw_add_undo_bitmap();
    }

    fn refresh_drawing(&mut self) {
        self.nv.refresh_drawing(true);
    }

    fn set_slice_type(&mut self, slice: SliceType) {
        self.nv.set_slice_type(slice.into());
    }

    fn set_drag_mode(&mut self, mode: DragMode) {
        set(&self.nv.opts(), "dragMode", &JsValue::from(drag_mode_number(mode)));
    }

    fn slice_scroll_2d(&mut self, amount: f64, x: f64, y: f64) {
        self.nv.slice_scroll_2d(amount, x, y);
    }

    fn mm_to_frac(&self, mm: [f64; 3]) -> [f64; 3] {
        vec3_from_js(&self.nv.mm2frac(&js_vec3(mm)))
    }

    fn frac_to_mm(&self, frac: [f64; 3]) -> [f64; 3] {
        vec3_from_js(&self.nv.frac2mm(&js_vec3(frac)))
    }

    fn crosshair_frac(&self) -> [f64; 3] {
        vec3_from_js(&get(&self.nv.scene(), "crosshairPos"))
    }

    fn set_crosshair_frac(&mut self, frac: [f64; 3]) {
        set(&self.nv.scene(), "crosshairPos", &js_vec3(frac));
    }

    fn draw_scene(&mut self) {
        self.nv.draw_scene();
    }

    fn update_gl_volume(&mut self) {
        self.nv.update_gl_volume();
    }

    fn set_draw_opacity(&mut self, opacity: f32) {
        set(&self.nv, "drawOpacity", &JsValue::from_f64(f64::from(opacity)));
        self.nv.update_gl_volume();
    }

    fn save_document(&mut self, filename: &str) {
        self.nv.save_document(filename);
    }

    fn save_scene(&mut self, filename: &str) {
        self.nv.save_scene(filename);
    }
}

// ============================================================================
// Channel
// ============================================================================

/// [`Channel`] backed by a pusher-js channel object.
pub struct JsChannel {
    channel: PusherChannel,
}

impl Channel for JsChannel {
    fn trigger(&mut self, event: &str, data: &Value) -> Result<(), ChannelError> {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let data = data
            .serialize(&serializer)
            .map_err(|e| ChannelError::Send(e.to_string()))?;
        match self.channel.trigger(event, &data) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ChannelError::NotConnected),
            Err(e) => Err(ChannelError::Send(format!("{:?}", e))),
        }
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// UI notification passed to the page callback.
#[derive(Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
enum UiNotice {
    Loading(bool),
    Mode(&'static str),
    DragMode(DragMode),
    Opacity(f32),
}

impl From<UiEffect> for UiNotice {
    fn from(effect: UiEffect) -> Self {
        match effect {
            UiEffect::ShowLoading => UiNotice::Loading(true),
            UiEffect::HideLoading => UiNotice::Loading(false),
            UiEffect::ModeChanged(mode) => UiNotice::Mode(mode_label(mode)),
            UiEffect::DragModeChanged(mode) => UiNotice::DragMode(mode),
            UiEffect::OpacityChanged(opacity) => UiNotice::Opacity(opacity),
        }
    }
}

fn mode_label(mode: DrawingMode) -> &'static str {
    match mode {
        DrawingMode::Inactive => "off",
        DrawingMode::Draw(label) => Palette::name(label),
        DrawingMode::Erase => "eraser",
    }
}

/// Session participant driven from JavaScript.
#[wasm_bindgen]
pub struct Collaborator {
    controller: InteractionController<NiivueEngine, JsChannel>,
    on_ui: Function,
}

#[wasm_bindgen]
impl Collaborator {
    /// Wrap a viewer and a subscribed channel. `config` is a partial
    /// `SessionConfig` object (or undefined); page URL parameters override it.
    #[wasm_bindgen(constructor)]
    pub fn new(nv: Niivue, channel: PusherChannel, config: JsValue, on_ui: Function) -> Result<Collaborator, JsValue> {
        let mut config: SessionConfig = if config.is_undefined() || config.is_null() {
            SessionConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        page_params().apply(&mut config);
        log::info!("Collaborating on {}", config.channel_name());

        let controller = InteractionController::new(&config, NiivueEngine::new(nv), JsChannel { channel });
        Ok(Self { controller, on_ui })
    }

    #[wasm_bindgen(js_name = onSubscribed)]
    pub fn on_subscribed(&mut self) {
        let effects = self.controller.handle(SessionEvent::Subscribed { now: Instant::now() });
        self.notify(effects);
    }

    /// Forward any channel event; non-session events are ignored.
    #[wasm_bindgen(js_name = onChannelEvent)]
    pub fn on_channel_event(&mut self, event: &str, data: JsValue) {
        if !event.starts_with("client-") {
            return;
        }
        let data: Value = match serde_wasm_bindgen::from_value(data) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Unreadable {} payload: {}", event, e);
                return;
            }
        };
        let effects = self.controller.handle_remote(event, data);
        self.notify(effects);
    }

    #[wasm_bindgen(js_name = onLocationChange)]
    pub fn on_location_change(&mut self, vox: &[f64]) {
        if let [x, y, z, ..] = vox {
            self.handle(SessionEvent::LocationChanged([*x, *y, *z]));
        }
    }

    #[wasm_bindgen(js_name = onPointerMove)]
    pub fn on_pointer_move(&mut self, buttons: u32) {
        self.handle(SessionEvent::Pointer(PointerEvent::Move { buttons_down: buttons != 0 }));
    }

    #[wasm_bindgen(js_name = onPointerUp)]
    pub fn on_pointer_up(&mut self) {
        self.handle(SessionEvent::Pointer(PointerEvent::Up));
    }

    /// Key press by DOM `KeyboardEvent.code`.
    #[wasm_bindgen(js_name = onKeyDown)]
    pub fn on_key_down(&mut self, code: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) {
        let modifiers = Modifiers { shift, ctrl, alt, meta };
        self.handle(SessionEvent::Key(KeyEvent::from_code(code, modifiers)));
    }

    #[wasm_bindgen(js_name = onWheel)]
    pub fn on_wheel(&mut self, delta_y: f64, client_x: f64, client_y: f64, canvas_left: f64, canvas_top: f64) {
        self.handle(SessionEvent::Wheel(WheelEvent {
            delta_y,
            client_x,
            client_y,
            canvas_left,
            canvas_top,
        }));
    }

    /// Pick a pen color by its picker hex value.
    #[wasm_bindgen(js_name = selectColor)]
    pub fn select_color(&mut self, hex: &str) {
        match Palette::by_hex(hex) {
            Some(color) => self.handle(SessionEvent::SelectColor(color.label)),
            None => log::warn!("Unknown pen color {}", hex),
        }
    }

    #[wasm_bindgen(js_name = setOpacity)]
    pub fn set_opacity(&mut self, opacity: f32) {
        self.handle(SessionEvent::SetOpacity(opacity));
    }

    #[wasm_bindgen(js_name = setFilled)]
    pub fn set_filled(&mut self, filled: bool) {
        self.handle(SessionEvent::SetFilled(filled));
    }

    /// Advance the join wait; call periodically.
    pub fn tick(&mut self) {
        let effects = self.controller.tick(Instant::now());
        self.notify(effects);
    }

    #[wasm_bindgen(js_name = historyLength)]
    pub fn history_length(&self) -> usize {
        self.controller.session().history().len()
    }
}

impl Collaborator {
    fn handle(&mut self, event: SessionEvent) {
        let effects = self.controller.handle(event);
        self.notify(effects);
    }

    fn notify(&self, effects: Vec<UiEffect>) {
        for effect in effects {
            match serde_wasm_bindgen::to_value(&UiNotice::from(effect)) {
                Ok(notice) => {
                    if let Err(e) = self.on_ui.call1(&JsValue::NULL, &notice) {
                        log::error!("UI callback failed: {:?}", e);
                    }
                }
                Err(e) => log::error!("Failed to encode UI notice: {}", e),
            }
        }
    }
}

/// Overrides from the page URL; the query string wins over the hash.
fn page_params() -> UrlParams {
    let Some(window) = web_sys::window() else {
        return UrlParams::default();
    };
    let location = window.location();
    let query = location.search().map(|s| UrlParams::parse(&s)).unwrap_or_default();
    let hash = location.hash().map(|s| UrlParams::parse(&s)).unwrap_or_default();
    query.or(hash)
}

/// Initialize logging and the panic hook.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
    log::info!("VoxLink bridge loaded");
}
