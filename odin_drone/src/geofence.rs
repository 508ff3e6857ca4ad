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

use std::{collections::{HashMap,HashSet}, fmt};
use chrono::{DateTime,Utc};
use serde::Serialize;
use tracing::debug;
use crate::{TrackedObject, zones::Zone};

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize)]
#[serde(rename_all="lowercase")]
pub enum ZoneEventKind {
    Enter,
    Exit
}

impl fmt::Display for ZoneEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneEventKind::Enter => write!(f, "enter"),
            ZoneEventKind::Exit => write!(f, "exit"),
        }
    }
}

/// a zone boundary crossing of a tracked object
#[derive(Debug,Clone,Serialize)]
#[serde(rename_all="camelCase")]
pub struct ZoneEvent {
    pub object_id: String,
    pub zone_id: String,
    pub zone_name: String,
    pub kind: ZoneEventKind,
    pub time: DateTime<Utc>,
    pub drone: TrackedObject,
}

impl ZoneEvent {
    fn new (kind: ZoneEventKind, obj: &TrackedObject, zone: &Zone, time: DateTime<Utc>)->Self {
        ZoneEvent {
            object_id: obj.id.clone(),
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            kind,
            time,
            drone: obj.clone()
        }
    }
}

impl fmt::Display for ZoneEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} zone '{}' ({}) at {}", self.object_id, self.kind, self.zone_name, self.zone_id, self.time)
    }
}

/// detects zone enter/exit transitions of tracked objects.
/// Each crossing yields exactly one event since we remember the last inside/outside state per (object,zone) pair
#[derive(Debug,Default)]
pub struct GeofenceWatcher {
    membership: HashMap<(String,String),bool>, // (object_id,zone_id) -> inside
}

impl GeofenceWatcher {
    pub fn new()->Self { GeofenceWatcher::default() }

    /// evaluate the current (renderable) objects against the current zone set.
    /// Membership of zones that are not in `zones` anymore is dropped without events
    pub fn evaluate (&mut self, objects: &[TrackedObject], zones: &[Zone], now: DateTime<Utc>)->Vec<ZoneEvent> {
        let zone_ids: HashSet<&str> = zones.iter().map( |z| z.id.as_str()).collect();
        self.membership.retain( |(_,zone_id),_| zone_ids.contains( zone_id.as_str()));

        let mut events = Vec::new();

        for zone in zones.iter().filter( |z| z.is_evaluable()) {
            for obj in objects.iter().filter( |o| o.has_valid_position()) {
                let is_in = zone.contains( &obj.position);
                let was_in = self.membership.insert( (obj.id.clone(), zone.id.clone()), is_in).unwrap_or(false);

                if is_in && !was_in {
                    events.push( ZoneEvent::new( ZoneEventKind::Enter, obj, zone, now));
                } else if was_in && !is_in {
                    events.push( ZoneEvent::new( ZoneEventKind::Exit, obj, zone, now));
                }
            }
        }

        events
    }

    /// an object was evicted - generate exits for all zones it was still inside of and forget about it
    pub fn on_evicted (&mut self, obj: &TrackedObject, zones: &[Zone], now: DateTime<Utc>)->Vec<ZoneEvent> {
        let events: Vec<ZoneEvent> = zones.iter()
            .filter( |z| self.is_inside( &obj.id, &z.id))
            .map( |z| ZoneEvent::new( ZoneEventKind::Exit, obj, z, now))
            .collect();

        if !events.is_empty() {
            debug!("{} evicted while inside of {} zone(s)", obj.id, events.len());
        }
        self.remove_object( &obj.id);
        events
    }

    pub fn is_inside (&self, object_id: &str, zone_id: &str)->bool {
        // the tuple key means we have to allocate for lookup. Membership tables are small
        *self.membership.get( &(object_id.to_string(), zone_id.to_string())).unwrap_or(&false)
    }

    pub fn remove_object (&mut self, object_id: &str) {
        self.membership.retain( |(oid,_),_| oid != object_id);
    }

    pub fn remove_zone (&mut self, zone_id: &str) {
        self.membership.retain( |(_,zid),_| zid != zone_id);
    }

    /// number of (object,zone) membership entries
    pub fn len (&self)->usize { self.membership.len() }

    pub fn is_empty (&self)->bool { self.membership.is_empty() }

    pub fn clear (&mut self) { self.membership.clear() }
}
