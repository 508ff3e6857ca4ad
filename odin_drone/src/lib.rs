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
#![allow(unused)]

//! crate to reconcile live drone position reports into a stable set of tracked objects and to
//! watch those objects against circular zones (geofences).
//!
//! The processing chain is
//! ```text
//!   DroneSource --> wire (decode) --> DroneStore (merge) --> pruner (evict) --> DroneListener::on_update
//!                                                                          \--> GeofenceWatcher --> DroneListener::on_zone_event
//! ```
//! All mutable reconciliation state is owned by a per-subscription [`reconciler::Reconciler`].

use std::fmt;
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize,Serializer,ser::SerializeStruct};
use uom::si::{f64::{Length,Velocity}, length::{meter,foot}, velocity::{knot,meter_per_second}};

pub mod errors;
pub mod config;
pub mod wire;
pub mod frames;
pub mod store;
pub mod pruner;
pub mod geofence;
pub mod reconciler;
pub mod zones;
pub mod source;
pub mod subscription;

pub use config::{DroneConfig, DroneSourceConfig, ZoneServiceConfig, load_config};
pub use geofence::{GeofenceWatcher, ZoneEvent, ZoneEventKind};
pub use reconciler::Reconciler;
pub use source::{DroneSource, SourceInput, WsSource, PollSource, ChannelSource};
pub use subscription::{DroneSubscription, DroneListener, ConnectionState, update_listener};
pub use zones::{Zone, ZoneSpec, ZoneStore, SharedZones};

/// mean earth radius used for all great circle distances of this crate
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// id we assign to reports that do not carry any known id field
pub const UNKNOWN_ID: &str = "unknown";

/* #region position ***********************************************************************************/

/// a geodetic position in degrees. Note this is (de)serialized as `[lat,lng]` array
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
#[serde(from="[f64;2]", into="[f64;2]")]
pub struct LatLon {
    pub lat: f64,
    pub lng: f64,
}

impl LatLon {
    pub fn new (lat: f64, lng: f64)->Self { LatLon{lat,lng} }

    /// positions are only renderable if both components are finite and they are not both exactly zero
    /// (which is what we get from reports without any position field)
    pub fn is_valid (&self)->bool {
        self.lat.is_finite() && self.lng.is_finite() && !(self.lat == 0.0 && self.lng == 0.0)
    }
}

impl From<[f64;2]> for LatLon {
    fn from (a: [f64;2])->Self { LatLon{ lat: a[0], lng: a[1] } }
}

impl From<LatLon> for [f64;2] {
    fn from (p: LatLon)->Self { [p.lat, p.lng] }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6},{:.6}]", self.lat, self.lng)
    }
}

/// great circle distance using the haversine formula
pub fn haversine_distance (a: &LatLon, b: &LatLon)->Length {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let s1 = (dlat / 2.0).sin().powi(2);
    let s2 = a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    let h = s1 + s2;
    let c = 2.0 * h.sqrt().atan2( (1.0 - h).sqrt());

    Length::new::<meter>( EARTH_RADIUS_M * c)
}

/* #endregion position */

/* #region classification *****************************************************************************/

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize)]
#[serde(rename_all="UPPERCASE")]
pub enum Classification {
    Friend,
    Hostile,
    Unknown
}

impl Classification {
    /// parse an explicit status field value (case insensitive)
    pub fn from_status (s: &str)->Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FRIEND" => Some(Classification::Friend),
            "HOSTILE" => Some(Classification::Hostile),
            "UNKNOWN" => Some(Classification::Unknown),
            _ => None
        }
    }

    pub fn as_str (&self)->&'static str {
        match self {
            Classification::Friend => "FRIEND",
            Classification::Hostile => "HOSTILE",
            Classification::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// what we assume for objects that do not carry any classification hint.
/// There are two historical behaviors: legacy drone feeds treat everything as hostile unless it is
/// on an allow-list, camera frame feeds report unknown
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize,Default)]
pub enum ClassificationDefault {
    Hostile,
    #[default]
    Unknown
}

#[derive(Debug,Clone,Serialize,Deserialize,Default)]
pub struct ClassificationPolicy {
    #[serde(default)]
    pub default: ClassificationDefault,

    /// ids that are considered friendly in `Hostile` default mode
    #[serde(default)]
    pub allow_list: Vec<String>,
}

impl ClassificationPolicy {
    pub fn hostile_unless_allowed<I,S> (ids: I)->Self where I: IntoIterator<Item=S>, S: ToString {
        ClassificationPolicy {
            default: ClassificationDefault::Hostile,
            allow_list: ids.into_iter().map( |id| id.to_string()).collect()
        }
    }

    /// resolution order: explicit status, objective, type substring, configured default
    pub fn classify (&self, id: &str, status: Option<&str>, objective: Option<&str>, kind: Option<&str>)->Classification {
        if let Some(c) = status.and_then( Classification::from_status) {
            return c
        }

        if let Some(objective) = objective {
            let objective = objective.trim().to_ascii_lowercase();
            if objective == "our" || objective == "friend" {
                return Classification::Friend
            }
        }

        if let Some(kind) = kind {
            let kind = kind.to_ascii_lowercase();
            if kind.contains("friend") { // also covers "friendly"
                return Classification::Friend
            } else if kind.contains("hostile") || kind == "enemy" {
                return Classification::Hostile
            }
        }

        match self.default {
            ClassificationDefault::Unknown => Classification::Unknown,
            ClassificationDefault::Hostile => {
                if self.allow_list.iter().any( |a| a == id) { Classification::Friend } else { Classification::Hostile }
            }
        }
    }
}

/* #endregion classification */

/* #region tracked object *****************************************************************************/

/// the reconciled, UI facing state of a tracked drone.
/// kinematics are kept in metric units and only converted (to ft and kn) when serialized
#[derive(Debug,Clone,PartialEq)]
pub struct TrackedObject {
    pub id: String,
    pub display_name: String,
    pub classification: Classification,
    pub kind: String,

    pub position: LatLon,
    pub altitude: Length,
    pub speed: Velocity,
    pub heading: f64, // degrees

    pub last_update: DateTime<Utc>, // ingestion time, not payload time
    pub source_time: Option<String>, // payload (or frame) timestamp as reported
    pub source_cam_id: Option<String>,
    pub image_ref: Option<String>,
}

impl TrackedObject {
    pub fn has_valid_position (&self)->bool { self.position.is_valid() }

    pub fn altitude_ft (&self)->f64 { self.altitude.get::<foot>() }
    pub fn altitude_m (&self)->f64 { self.altitude.get::<meter>() }
    pub fn speed_kt (&self)->f64 { self.speed.get::<knot>() }
    pub fn speed_mps (&self)->f64 { self.speed.get::<meter_per_second>() }
}

impl Serialize for TrackedObject {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> where S: Serializer {
        let mut state = serializer.serialize_struct("TrackedObject", 13)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("displayName", &self.display_name)?;
        state.serialize_field("classification", &self.classification)?;
        state.serialize_field("type", &self.kind)?;
        state.serialize_field("position", &self.position)?;
        state.serialize_field("altitudeFt", &self.altitude_ft())?;
        state.serialize_field("alt", &self.altitude_m())?;
        state.serialize_field("speedKt", &self.speed_kt())?;
        state.serialize_field("headingDeg", &self.heading)?;
        state.serialize_field("lastUpdate", &self.last_update)?;
        if let Some(t) = &self.source_time { state.serialize_field("sourceTime", t)?; }
        if let Some(cam_id) = &self.source_cam_id { state.serialize_field("sourceCamId", cam_id)?; }
        if let Some(img) = &self.image_ref { state.serialize_field("imageRef", img)?; }
        state.end()
    }
}

impl fmt::Display for TrackedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "TrackedObject( id: {}, name: \"{}\", cls: {}, pos: {}", self.id, self.display_name, self.classification, self.position)?;
        write!( f, ", alt: {:.0}ft, spd: {:.1}kn, hdg: {:.0}", self.altitude_ft(), self.speed_kt(), self.heading)?;
        if let Some(cam_id) = &self.source_cam_id { write!( f, ", cam: {cam_id}")?; }
        write!( f, ", time: {})", self.last_update)
    }
}

/* #endregion tracked object */
