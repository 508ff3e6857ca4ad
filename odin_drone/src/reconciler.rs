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

use chrono::{DateTime,Utc};
use serde_json::Value;
use tracing::{debug,trace};
use crate::{
    ClassificationPolicy, TrackedObject,
    config::DroneConfig,
    errors::Result,
    frames::{SharedFrames,new_shared_frames},
    geofence::{GeofenceWatcher,ZoneEvent},
    pruner::{self,StalenessPolicy},
    store::DroneStore,
    wire,
    zones::Zone,
};

/// the mutable state of one drone subscription: tracked objects, movement records, zone membership
/// and cached frames. This is synchronous and never looks at the clock itself, all operations get
/// their `now` from the caller
#[derive(Debug)]
pub struct Reconciler {
    store: DroneStore,
    watcher: GeofenceWatcher,
    frames: SharedFrames,
    classification: ClassificationPolicy,
    staleness: StalenessPolicy,
}

/// outcome of a staleness sweep
#[derive(Debug,Default)]
pub struct PruneResult {
    pub evicted: Vec<TrackedObject>,
    pub events: Vec<ZoneEvent>, // synthetic exits of evicted objects
}

impl PruneResult {
    pub fn has_evictions (&self)->bool { !self.evicted.is_empty() }
}

impl Reconciler {
    pub fn new (classification: ClassificationPolicy, staleness: StalenessPolicy)->Self {
        Reconciler {
            store: DroneStore::new(),
            watcher: GeofenceWatcher::new(),
            frames: new_shared_frames(),
            classification,
            staleness
        }
    }

    pub fn from_config (config: &DroneConfig)->Self {
        Reconciler::new( config.classification.clone(), config.staleness_policy())
    }

    /// process a raw text message. Returns true if any object was updated
    pub fn process_text (&mut self, text: &str, now: DateTime<Utc>)->Result<bool> {
        let candidates = wire::decode_text( text, &self.classification, &self.frames, now)?;
        Ok( self.ingest( candidates, now) )
    }

    /// process a parsed push message
    pub fn process_value (&mut self, msg: &Value, now: DateTime<Utc>)->bool {
        let candidates = wire::decode_msg( msg, &self.classification, &self.frames, now);
        self.ingest( candidates, now)
    }

    /// process the result of a poll request
    pub fn process_batch (&mut self, batch: &Value, now: DateTime<Utc>)->bool {
        let candidates = wire::decode_poll_result( batch, &self.classification, now);
        self.ingest( candidates, now)
    }

    /// merge decoded candidates in order. Later candidates for the same id win
    pub fn ingest (&mut self, candidates: Vec<TrackedObject>, now: DateTime<Utc>)->bool {
        let changed = !candidates.is_empty();
        for candidate in candidates {
            if !candidate.has_valid_position() {
                debug!("object {} has invalid position {}", candidate.id, candidate.position);
            }
            let movement = self.store.upsert( candidate, now, &self.staleness);
            trace!("upsert movement: {:?}", movement);
        }
        changed
    }

    /// run a staleness sweep. Evicted objects that were inside of zones produce exit events
    pub fn prune (&mut self, zones: &[Zone], now: DateTime<Utc>)->PruneResult {
        let evicted = pruner::prune( &mut self.store, &self.staleness, now);
        let mut events = Vec::new();
        for obj in &evicted {
            events.extend( self.watcher.on_evicted( obj, zones, now));
        }
        PruneResult { evicted, events }
    }

    /// check the current snapshot against the zone set
    pub fn evaluate_zones (&mut self, zones: &[Zone], now: DateTime<Utc>)->Vec<ZoneEvent> {
        let objects = self.store.snapshot();
        self.watcher.evaluate( &objects, zones, now)
    }

    pub fn remove_zone (&mut self, zone_id: &str) {
        self.watcher.remove_zone( zone_id)
    }

    pub fn snapshot (&self)->Vec<TrackedObject> { self.store.snapshot() }

    pub fn store (&self)->&DroneStore { &self.store }

    pub fn watcher (&self)->&GeofenceWatcher { &self.watcher }

    pub fn frames (&self)->&SharedFrames { &self.frames }

    pub fn staleness_policy (&self)->&StalenessPolicy { &self.staleness }

    /// teardown - forget all objects, movement records and memberships (frames are kept for other holders)
    pub fn clear (&mut self) {
        self.store.clear();
        self.watcher.clear();
    }
}
