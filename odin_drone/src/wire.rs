/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! decoder for inbound drone messages. Upstream producers went through several generations of field
//! names for the same concepts, which is why all lookups below go through ordered key lists.
//! Supported message shapes are
//! ```text
//!   {"type":"hello", "ok":true}                                      handshake (ignored)
//!   {"type":"drone", "drone_id":.., "latitude":.., ...}               legacy single object
//!   {"fram_id":.., "cam_id":.., "timestamp":.., "objects":[..], ..}  camera frame envelope
//! ```
//! poll endpoints return arrays of raw objects, backend summaries (`lastLat`,`lastLon`..) or already
//! reconciled records (`position: [lat,lng]`), all of which are handled by [`decode_object`]

use chrono::{DateTime,Utc};
use serde_json::Value;
use uom::si::{f64::{Length,Velocity}, length::meter, velocity::{knot,meter_per_second}};
use tracing::{debug,trace};
use crate::{
    ClassificationPolicy, LatLon, TrackedObject, UNKNOWN_ID,
    errors::Result,
    frames::{FrameInfo,SharedFrames}
};

const ID_KEYS: &[&str] = &["obj_id", "drone_id", "id"];
const LABEL_KEYS: &[&str] = &["callsign", "name"];
const LAT_KEYS: &[&str] = &["lat", "latitude", "lastLat"];
const LNG_KEYS: &[&str] = &["lng", "longitude", "lastLon"];
const ALT_KEYS: &[&str] = &["alt", "altitude_m", "lastAltM"];
const HEADING_KEYS: &[&str] = &["heading_deg", "headingDeg", "lastHeadingDeg"];
const CAM_ID_KEYS: &[&str] = &["cam_id", "camId", "source_id"];
const TIME_KEYS: &[&str] = &["timestamp", "lastSeenAt"];

const UNNAMED: &str = "UNNAMED";

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
enum SpeedUnit { Knot, MeterPerSecond }

const SPEED_KEYS: &[(&str,SpeedUnit)] = &[
    ("speed_kt", SpeedUnit::Knot),
    ("speedKt", SpeedUnit::Knot),
    ("speed_mps", SpeedUnit::MeterPerSecond),
    ("lastSpeedMS", SpeedUnit::MeterPerSecond),
];

/// what kind of message we got
#[derive(Debug,Clone,Copy,PartialEq)]
pub enum WireMsg<'a> {
    Hello,
    Drone(&'a Value),
    Frame(&'a Value, &'a Vec<Value>),
    Other
}

pub fn classify_msg (msg: &Value)->WireMsg<'_> {
    match msg.get("type").and_then( |v| v.as_str()) {
        Some("hello") => return WireMsg::Hello,
        Some("drone") => return WireMsg::Drone(msg),
        _ => {}
    }
    if let Some(objects) = msg.get("objects").and_then( |v| v.as_array()) {
        WireMsg::Frame(msg, objects)
    } else {
        WireMsg::Other
    }
}

/// frame level values that are inherited by all objects of a frame
#[derive(Debug,Clone,Default)]
pub struct FrameContext<'a> {
    pub cam_id: Option<&'a str>,
    pub timestamp: Option<&'a str>,
}

/// decode a text (websocket) message. Malformed JSON is reported as error, everything else that we
/// don't understand just yields an empty list
pub fn decode_text (text: &str, policy: &ClassificationPolicy, frames: &SharedFrames, now: DateTime<Utc>)->Result<Vec<TrackedObject>> {
    let msg: Value = serde_json::from_str(text)?;
    Ok( decode_msg( &msg, policy, frames, now) )
}

/// decode a single parsed inbound message into tracked object candidates. Frame envelopes are
/// also cached (by camera id) in `frames`
pub fn decode_msg (msg: &Value, policy: &ClassificationPolicy, frames: &SharedFrames, now: DateTime<Utc>)->Vec<TrackedObject> {
    match classify_msg(msg) {
        WireMsg::Hello => {
            debug!("received hello from server");
            Vec::new()
        }
        WireMsg::Drone(obj) => {
            vec![ decode_object( obj, &FrameContext::default(), policy, now) ]
        }
        WireMsg::Frame(envelope, objects) => {
            if let Some(fi) = FrameInfo::from_envelope( envelope, now) {
                frames.insert( fi.cam_id.clone(), fi);
            }
            let ctx = FrameContext {
                cam_id: first_str_ref( envelope, CAM_ID_KEYS),
                timestamp: first_str_ref( envelope, &["timestamp"]),
            };
            objects.iter()
                .filter( |o| o.is_object())
                .map( |o| decode_object( o, &ctx, policy, now))
                .collect()
        }
        WireMsg::Other => {
            trace!("ignoring unsupported message");
            Vec::new()
        }
    }
}

/// decode the result of a poll request, which has to be a JSON array. Anything else is ignored
pub fn decode_poll_result (v: &Value, policy: &ClassificationPolicy, now: DateTime<Utc>)->Vec<TrackedObject> {
    if let Some(list) = v.as_array() {
        let ctx = FrameContext::default();
        list.iter()
            .filter( |o| o.is_object())
            .map( |o| decode_object( o, &ctx, policy, now))
            .collect()
    } else {
        debug!("ignoring non-array poll result");
        Vec::new()
    }
}

/// turn a single JSON object into a candidate. This never fails - missing or non-numeric values
/// become 0 (and a 0,0 position is invalid, which the store takes care of)
pub fn decode_object (obj: &Value, ctx: &FrameContext, policy: &ClassificationPolicy, now: DateTime<Utc>)->TrackedObject {
    let id_field = first_str( obj, ID_KEYS);
    let id = id_field.clone().unwrap_or_else( || UNKNOWN_ID.to_string());

    let display_name = first_str( obj, LABEL_KEYS)
        .unwrap_or_else( || id_field.as_deref().unwrap_or(UNNAMED).to_uppercase());

    let kind = first_str( obj, &["type"]);
    let classification = policy.classify(
        &id,
        first_str_ref( obj, &["status"]),
        first_str_ref( obj, &["objective"]),
        kind.as_deref()
    );

    // reconciled records only carry `position`, so it comes last
    let (pos_lat, pos_lng) = position_array( obj);
    let lat = first_number( obj, LAT_KEYS).or( pos_lat).unwrap_or(0.0);
    let lng = first_number( obj, LNG_KEYS).or( pos_lng).unwrap_or(0.0);

    let altitude = Length::new::<meter>( first_number( obj, ALT_KEYS).unwrap_or(0.0));
    let speed = speed( obj);
    let heading = first_number( obj, HEADING_KEYS).unwrap_or(0.0);

    let source_time = first_str( obj, &["timestamp"])
        .or_else( || ctx.timestamp.map( |s| s.to_string()))
        .or_else( || first_str( obj, TIME_KEYS));
    let source_cam_id = first_str( obj, CAM_ID_KEYS).or_else( || ctx.cam_id.map( |s| s.to_string()));
    let image_ref = first_str( obj, &["image_path"]);

    TrackedObject {
        id,
        display_name,
        classification,
        kind: kind.unwrap_or_else( || UNKNOWN_ID.to_string()),
        position: LatLon::new( lat, lng),
        altitude,
        speed,
        heading,
        last_update: now,
        source_time,
        source_cam_id,
        image_ref,
    }
}

fn speed (obj: &Value)->Velocity {
    for (key,unit) in SPEED_KEYS {
        if let Some(v) = obj.get(*key).and_then( as_number) {
            return match unit {
                SpeedUnit::Knot => Velocity::new::<knot>(v),
                SpeedUnit::MeterPerSecond => Velocity::new::<meter_per_second>(v),
            }
        }
    }
    Velocity::new::<meter_per_second>(0.0)
}

/// components of a `position: [lat,lng]` array (if any)
fn position_array (obj: &Value)->(Option<f64>,Option<f64>) {
    match obj.get("position").and_then( |v| v.as_array()) {
        Some(a) if a.len() == 2 => (as_number( &a[0]), as_number( &a[1])),
        _ => (None, None)
    }
}

/// numbers and numeric strings are accepted. NaN counts as absent
fn as_number (v: &Value)->Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None
    };
    n.filter( |x| !x.is_nan())
}

fn first_number (obj: &Value, keys: &[&str])->Option<f64> {
    keys.iter().find_map( |k| obj.get(*k).and_then( as_number))
}

/// first non-empty string (or number) value of the given keys
fn first_str (obj: &Value, keys: &[&str])->Option<String> {
    keys.iter().find_map( |k| {
        match obj.get(*k)? {
            Value::String(s) if !s.is_empty() => Some( s.clone()),
            Value::Number(n) => Some( n.to_string()),
            _ => None
        }
    })
}

fn first_str_ref<'a> (obj: &'a Value, keys: &[&str])->Option<&'a str> {
    keys.iter().find_map( |k| obj.get(*k)?.as_str().filter( |s| !s.is_empty()))
}
