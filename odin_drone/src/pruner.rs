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

//! liveness policy for tracked objects. There are two independent reasons to drop an object:
//!   - it keeps reporting but has not moved more than `move_epsilon` for longer than `timeout`
//!   - it has not reported at all for longer than `timeout`

use std::time::Duration;
use chrono::{DateTime,TimeDelta,Utc};
use uom::si::length::meter;
use tracing::debug;
use crate::{LatLon, TrackedObject, haversine_distance, store::DroneStore, config::{DEFAULT_STATIONARY_TIMEOUT,DEFAULT_MOVE_EPSILON_M}};

#[derive(Debug,Clone,Copy,PartialEq)]
pub struct StalenessPolicy {
    pub timeout: TimeDelta,
    pub move_epsilon: f64, // meters
}

impl StalenessPolicy {
    pub fn new (timeout: Duration, move_epsilon: f64)->Self {
        let timeout = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
        StalenessPolicy { timeout, move_epsilon }
    }
}

impl Default for StalenessPolicy {
    fn default()->Self { StalenessPolicy::new( DEFAULT_STATIONARY_TIMEOUT, DEFAULT_MOVE_EPSILON_M) }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Movement {
    Moving,
    Stationary
}

/// per object bookkeeping to detect objects that report without moving
#[derive(Debug,Clone,PartialEq)]
pub struct MovementRecord {
    pub last_position: LatLon,
    pub stationary_since: Option<DateTime<Utc>>, // None while moving
}

impl MovementRecord {
    /// first sighting does not count as stationary
    pub fn new (position: LatLon)->Self {
        MovementRecord { last_position: position, stationary_since: None }
    }

    /// note that we always record the new position, even if it is within epsilon. Otherwise slow but
    /// steady drift could never accumulate into a move, and jitter must not reset the stationary clock
    pub fn update (&mut self, position: LatLon, now: DateTime<Utc>, move_epsilon: f64)->Movement {
        let dist = haversine_distance( &self.last_position, &position).get::<meter>();
        self.last_position = position;

        if dist > move_epsilon {
            self.stationary_since = None;
            Movement::Moving
        } else {
            if self.stationary_since.is_none() {
                self.stationary_since = Some(now);
            }
            Movement::Stationary
        }
    }

    pub fn is_stationary_expired (&self, now: DateTime<Utc>, timeout: TimeDelta)->bool {
        if let Some(since) = self.stationary_since {
            (now - since) > timeout
        } else {
            false
        }
    }
}

/// run one staleness sweep over the store and return the evicted objects (in no particular order)
pub fn prune (store: &mut DroneStore, policy: &StalenessPolicy, now: DateTime<Utc>)->Vec<TrackedObject> {
    let mut expired: Vec<String> = Vec::new();

    // (1) objects that keep reporting without moving
    for (id, rec) in store.movements() {
        if rec.is_stationary_expired( now, policy.timeout) {
            expired.push( id.clone());
        }
    }

    // (2) objects we have not heard from (regardless of movement state)
    for obj in store.objects() {
        if (now - obj.last_update) > policy.timeout && !expired.contains( &obj.id) {
            expired.push( obj.id.clone());
        }
    }

    let mut evicted = Vec::with_capacity( expired.len());
    for id in &expired {
        if let Some(obj) = store.evict( id) {
            debug!("evicted stale object {}", id);
            evicted.push( obj);
        }
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t (millis: i64)->DateTime<Utc> { DateTime::<Utc>::from_timestamp_millis( 1_700_000_000_000 + millis).unwrap() }

    #[test]
    fn test_jitter_keeps_stationary_clock() {
        let p0 = LatLon::new( 13.75, 100.5);
        let mut rec = MovementRecord::new( p0);

        // ~0.5m offsets
        assert_eq!( rec.update( LatLon::new( 13.750004, 100.5), t(500), 2.0), Movement::Stationary);
        assert_eq!( rec.stationary_since, Some(t(500)));
        assert_eq!( rec.update( p0, t(1000), 2.0), Movement::Stationary);
        assert_eq!( rec.stationary_since, Some(t(500)));
        assert_eq!( rec.last_position, p0);
    }

    #[test]
    fn test_move_clears_stationary_clock() {
        let mut rec = MovementRecord::new( LatLon::new( 10.0, 100.0));
        rec.update( LatLon::new( 10.0, 100.0), t(1000), 2.0);
        assert!( rec.stationary_since.is_some());

        assert_eq!( rec.update( LatLon::new( 10.0001, 100.0001), t(2000), 2.0), Movement::Moving);
        assert!( rec.stationary_since.is_none());
        assert!( !rec.is_stationary_expired( t(60_000), TimeDelta::milliseconds(10_000)));
    }
}
