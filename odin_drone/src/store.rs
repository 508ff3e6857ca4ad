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

use std::collections::HashMap;
use chrono::{DateTime,Utc};
use crate::{TrackedObject, pruner::{Movement,MovementRecord,StalenessPolicy}};

/// the authoritative set of tracked objects, keyed by id.
/// This is owned by a single reconciler and hence not synchronized
#[derive(Debug,Default)]
pub struct DroneStore {
    objects: HashMap<String,TrackedObject>,
    movements: HashMap<String,MovementRecord>,
}

impl DroneStore {
    pub fn new()->Self { DroneStore::default() }

    /// insert or fully replace the object with the candidate's id (last write wins).
    /// Candidates without a valid position are stored so that they can still go stale, but they
    /// neither create nor update the movement record
    pub fn upsert (&mut self, candidate: TrackedObject, now: DateTime<Utc>, policy: &StalenessPolicy)->Option<Movement> {
        let movement = if candidate.has_valid_position() {
            let pos = candidate.position;
            if let Some(rec) = self.movements.get_mut( &candidate.id) {
                Some( rec.update( pos, now, policy.move_epsilon))
            } else {
                self.movements.insert( candidate.id.clone(), MovementRecord::new( pos));
                Some( Movement::Moving)
            }
        } else {
            None
        };

        self.objects.insert( candidate.id.clone(), candidate);
        movement
    }

    /// the renderable set, i.e. all objects with valid positions
    pub fn snapshot (&self)->Vec<TrackedObject> {
        self.objects.values().filter( |o| o.has_valid_position()).cloned().collect()
    }

    pub fn evict (&mut self, id: &str)->Option<TrackedObject> {
        self.movements.remove( id);
        self.objects.remove( id)
    }

    pub fn get (&self, id: &str)->Option<&TrackedObject> { self.objects.get( id) }

    pub fn movement (&self, id: &str)->Option<&MovementRecord> { self.movements.get( id) }

    pub fn contains (&self, id: &str)->bool { self.objects.contains_key( id) }

    /// number of stored objects, including the ones without valid position
    pub fn len (&self)->usize { self.objects.len() }

    pub fn is_empty (&self)->bool { self.objects.is_empty() }

    pub fn ids (&self)->Vec<String> { self.objects.keys().cloned().collect() }

    pub fn objects (&self)->impl Iterator<Item=&TrackedObject> { self.objects.values() }

    pub fn movements (&self)->impl Iterator<Item=(&String,&MovementRecord)> { self.movements.iter() }

    pub fn clear (&mut self) {
        self.objects.clear();
        self.movements.clear();
    }
}
