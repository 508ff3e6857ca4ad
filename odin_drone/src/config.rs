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

use std::{fs, path::Path, time::Duration};
use serde::{Deserialize, Deserializer};
use parse_duration::parse;
use crate::{ClassificationPolicy, errors::Result, pruner::StalenessPolicy};

pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_millis(1_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);
pub const DEFAULT_STATIONARY_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_MOVE_EPSILON_M: f64 = 2.0;
pub const DEFAULT_ZONE_SERVICE_TIMEOUT: Duration = Duration::from_secs(5);

/// the configuration of a drone subscription, normally read from a RON file such as
/// ```text
/// DroneConfig(
///     source: Push( url: "ws://localhost:3000/ws", reconnect_delay: Some("5s") ),
///     stationary_timeout: "10s",
///     classification: ( default: Hostile, allow_list: ["DRN-2203"] ),
/// )
/// ```
#[derive(Deserialize,Debug,Clone)]
pub struct DroneConfig {
    pub source: DroneSourceConfig,

    /// cadence of the staleness sweep
    #[serde(default="default_prune_interval", deserialize_with="deserialize_nonzero_duration")]
    pub prune_interval: Duration,

    /// applies both to stationary and to silent objects
    #[serde(default="default_stationary_timeout", deserialize_with="deserialize_duration")]
    pub stationary_timeout: Duration,

    /// position changes up to this distance (in meters) are treated as jitter
    #[serde(default="default_move_epsilon")]
    pub move_epsilon: f64,

    #[serde(default)]
    pub classification: ClassificationPolicy,

    #[serde(default)]
    pub zone_service: Option<ZoneServiceConfig>,
}

impl DroneConfig {
    pub fn with_source (source: DroneSourceConfig)->Self {
        DroneConfig {
            source,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
            stationary_timeout: DEFAULT_STATIONARY_TIMEOUT,
            move_epsilon: DEFAULT_MOVE_EPSILON_M,
            classification: ClassificationPolicy::default(),
            zone_service: None,
        }
    }

    pub fn from_ron_str (s: &str)->Result<Self> {
        Ok( ron::de::from_str(s)? )
    }

    pub fn staleness_policy (&self)->StalenessPolicy {
        StalenessPolicy::new( self.stationary_timeout, self.move_epsilon)
    }
}

/// where the position reports come from. Both variants feed the same reconciliation
#[derive(Deserialize,Debug,Clone)]
pub enum DroneSourceConfig {
    /// persistent websocket connection
    Push {
        url: String,
        #[serde(default, deserialize_with="deserialize_optional_duration")]
        reconnect_delay: Option<Duration>,
    },

    /// periodic HTTP GET of a JSON array
    Pull {
        url: String,
        #[serde(default="default_poll_interval", deserialize_with="deserialize_nonzero_duration")]
        interval: Duration,
    }
}

/// the REST service that stores zones ("marks")
#[derive(Deserialize,Debug,Clone)]
pub struct ZoneServiceConfig {
    pub base_uri: String,

    #[serde(default="default_zone_service_timeout", deserialize_with="deserialize_duration")]
    pub timeout: Duration,
}

/// load a RON config from the given path
pub fn load_config<C,P> (path: P)->Result<C> where C: for<'a> Deserialize<'a>, P: AsRef<Path> {
    let s = fs::read_to_string( path.as_ref())?;
    Ok( ron::de::from_str( &s)? )
}

fn default_prune_interval()->Duration { DEFAULT_PRUNE_INTERVAL }
fn default_poll_interval()->Duration { DEFAULT_POLL_INTERVAL }
fn default_stationary_timeout()->Duration { DEFAULT_STATIONARY_TIMEOUT }
fn default_move_epsilon()->f64 { DEFAULT_MOVE_EPSILON_M }
fn default_zone_service_timeout()->Duration { DEFAULT_ZONE_SERVICE_TIMEOUT }

fn deserialize_duration<'a,D> (deserializer: D)->std::result::Result<Duration,D::Error> where D: Deserializer<'a> {
    String::deserialize(deserializer).and_then( |s| {
        parse( s.as_str()).map_err( |e| serde::de::Error::custom( format!("{:?}", e)))
    })
}

/// periods of timers and poll loops
fn deserialize_nonzero_duration<'a,D> (deserializer: D)->std::result::Result<Duration,D::Error> where D: Deserializer<'a> {
    let d = deserialize_duration( deserializer)?;
    if d.is_zero() {
        Err( serde::de::Error::custom( "duration has to be greater than zero"))
    } else {
        Ok(d)
    }
}

fn deserialize_optional_duration<'a,D> (deserializer: D)->std::result::Result<Option<Duration>,D::Error> where D: Deserializer<'a> {
    let s: Option<String> = Option::deserialize(deserializer)?;
    if let Some(s) = s {
        let d = parse( s.as_str()).map_err( |e| serde::de::Error::custom( format!("{:?}", e)))?;
        Ok( Some(d) )
    } else {
        Ok(None)
    }
}
