//! Session protocol carried over the pub/sub channel.
//!
//! Every message is a channel event name plus a JSON payload. The names and
//! payload shapes match the browser clients already deployed:
//!
//! ```text
//! client-receive        {"isFilled":false,"drawing":[[x,y,z],...],"label":2}
//! client-set-slicetype  {"view_number":1}
//! client-receive-wheel  {"data":{"mouse_args":{...},"canvas_info":{...}}}
//! client-undo           {}
//! client-sync-needed    {"isNeeded":true}
//! client-sync-onjoin    {"currentDrawData":[...],"view":0,"thisMM":[x,y,z]}
//! ```

use crate::engine::SliceType;
use crate::input::WheelEvent;
use crate::stroke::Stroke;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub const EVENT_STROKE: &str = "client-receive";
pub const EVENT_VIEW_CHANGE: &str = "client-set-slicetype";
pub const EVENT_WHEEL: &str = "client-receive-wheel";
pub const EVENT_UNDO: &str = "client-undo";
pub const EVENT_SYNC_REQUEST: &str = "client-sync-needed";
pub const EVENT_SYNC_SNAPSHOT: &str = "client-sync-onjoin";

/// Errors decoding or encoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("malformed {event} payload: {source}")]
    Malformed {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("stroke has no points")]
    EmptyStroke,
}

/// View change broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewChange {
    pub view_number: SliceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseArgs {
    #[serde(rename = "deltaY")]
    pub delta_y: f64,
    #[serde(rename = "clientX")]
    pub client_x: f64,
    #[serde(rename = "clientY")]
    pub client_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasInfo {
    pub left: f64,
    pub top: f64,
}

/// Wheel scroll broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelScroll {
    pub mouse_args: MouseArgs,
    pub canvas_info: CanvasInfo,
}

impl WheelScroll {
    /// Signed scroll step: backwards for upward wheel motion.
    pub fn scroll_amount(&self, step: f64) -> f64 {
        if self.mouse_args.delta_y < 0.0 { -step } else { step }
    }

    /// Pointer position relative to the sender's canvas origin.
    pub fn canvas_offset(&self) -> (f64, f64) {
        (
            self.mouse_args.client_x - self.canvas_info.left,
            self.mouse_args.client_y - self.canvas_info.top,
        )
    }
}

impl From<WheelEvent> for WheelScroll {
    fn from(wheel: WheelEvent) -> Self {
        Self {
            mouse_args: MouseArgs {
                delta_y: wheel.delta_y,
                client_x: wheel.client_x,
                client_y: wheel.client_y,
            },
            canvas_info: CanvasInfo {
                left: wheel.canvas_left,
                top: wheel.canvas_top,
            },
        }
    }
}

/// Wheel payloads arrive wrapped in `data`; the bare form is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum WheelPayload {
    Wrapped { data: WheelScroll },
    Bare(WheelScroll),
}

#[derive(Serialize)]
struct WheelWrapped<'a> {
    data: &'a WheelScroll,
}

/// Request for the current session state, sent on join.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(rename = "isNeeded", default)]
    pub is_needed: bool,
}

/// Session state sent to a joining client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    #[serde(rename = "currentDrawData", default)]
    pub current_draw_data: Vec<Stroke>,
    #[serde(default)]
    pub view: Option<SliceType>,
    /// Crosshair position in millimetres.
    #[serde(
        rename = "thisMM",
        default,
        deserialize_with = "deserialize_mm",
        skip_serializing_if = "Option::is_none"
    )]
    pub this_mm: Option<[f64; 3]>,
}

/// Millimetre vectors come either as a list or, when a typed array was
/// serialized by a browser, as an object keyed "0", "1", "2"... A fourth
/// homogeneous component is dropped.
fn deserialize_mm<'de, D>(deserializer: D) -> Result<Option<[f64; 3]>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MmValue {
        List(Vec<f64>),
        Indexed(BTreeMap<String, f64>),
    }

    let Some(value) = Option::<MmValue>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let components: Vec<f64> = match value {
        MmValue::List(list) => list,
        MmValue::Indexed(map) => (0..3)
            .map_while(|i| map.get(&i.to_string()).copied())
            .collect(),
    };
    match components.as_slice() {
        [x, y, z, ..] => Ok(Some([*x, *y, *z])),
        _ => Err(serde::de::Error::custom("expected at least three components")),
    }
}

/// A message exchanged between session peers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    Stroke(Stroke),
    ViewChange(ViewChange),
    Wheel(WheelScroll),
    Undo,
    SyncRequest(SyncRequest),
    SyncSnapshot(SyncSnapshot),
}

impl ProtocolMessage {
    /// Channel event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            ProtocolMessage::Stroke(_) => EVENT_STROKE,
            ProtocolMessage::ViewChange(_) => EVENT_VIEW_CHANGE,
            ProtocolMessage::Wheel(_) => EVENT_WHEEL,
            ProtocolMessage::Undo => EVENT_UNDO,
            ProtocolMessage::SyncRequest(_) => EVENT_SYNC_REQUEST,
            ProtocolMessage::SyncSnapshot(_) => EVENT_SYNC_SNAPSHOT,
        }
    }

    /// JSON payload for the channel.
    pub fn payload(&self) -> Result<Value, ProtocolError> {
        let event = self.event_name();
        let encoded = match self {
            ProtocolMessage::Stroke(stroke) => serde_json::to_value(stroke),
            ProtocolMessage::ViewChange(view) => serde_json::to_value(view),
            ProtocolMessage::Wheel(wheel) => serde_json::to_value(WheelWrapped { data: wheel }),
            ProtocolMessage::Undo => Ok(Value::Object(serde_json::Map::new())),
            ProtocolMessage::SyncRequest(request) => serde_json::to_value(request),
            ProtocolMessage::SyncSnapshot(snapshot) => serde_json::to_value(snapshot),
        };
        encoded.map_err(|source| ProtocolError::Malformed { event, source })
    }

    /// Decode a channel event. Non-protocol events yield `UnknownEvent`.
    pub fn decode(event: &str, data: Value) -> Result<Self, ProtocolError> {
        match event {
            EVENT_STROKE => {
                let stroke: Stroke = parse(EVENT_STROKE, data)?;
                if stroke.is_empty() {
                    return Err(ProtocolError::EmptyStroke);
                }
                Ok(ProtocolMessage::Stroke(stroke))
            }
            EVENT_VIEW_CHANGE => Ok(ProtocolMessage::ViewChange(parse(EVENT_VIEW_CHANGE, data)?)),
            EVENT_WHEEL => {
                let wheel = match parse::<WheelPayload>(EVENT_WHEEL, data)? {
                    WheelPayload::Wrapped { data } => data,
                    WheelPayload::Bare(wheel) => wheel,
                };
                Ok(ProtocolMessage::Wheel(wheel))
            }
            EVENT_UNDO => Ok(ProtocolMessage::Undo),
            EVENT_SYNC_REQUEST => Ok(ProtocolMessage::SyncRequest(parse(EVENT_SYNC_REQUEST, data)?)),
            EVENT_SYNC_SNAPSHOT => Ok(ProtocolMessage::SyncSnapshot(parse(EVENT_SYNC_SNAPSHOT, data)?)),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// Check whether an event name belongs to this protocol.
    pub fn is_protocol_event(event: &str) -> bool {
        matches!(
            event,
            EVENT_STROKE
                | EVENT_VIEW_CHANGE
                | EVENT_WHEEL
                | EVENT_UNDO
                | EVENT_SYNC_REQUEST
                | EVENT_SYNC_SNAPSHOT
        )
    }
}

fn parse<T: for<'de> Deserialize<'de>>(event: &'static str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::Malformed { event, source })
}
