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

use std::time::Duration;
use anyhow::{Result,anyhow};
use clap::Parser;
use lazy_static::lazy_static;
use tokio::{self, time::interval};
use tracing::{info,warn};
use tracing_subscriber::EnvFilter;
use odin_drone::{
    ConnectionState, DroneConfig, DroneListener, DroneSubscription, LatLon, TrackedObject, ZoneEvent, ZoneSpec, ZoneStore,
    load_config,
    zones::{FallbackZoneStore, MemoryZoneStore, SharedZones, new_shared_zones, sync_zones},
};

const ZONE_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// drone monitoring tool that prints reconciled drone snapshots and zone enter/exit events
#[derive(Parser)]
#[command(version, about)]
struct CliOpts {
    /// print snapshots as JSON
    #[arg(long)]
    json: bool,

    /// local zone to watch, formatted as <name>:<lat>:<lon>:<radius-meters>
    #[arg(long)]
    zone: Vec<String>,

    /// path of the RON config file
    #[arg(default_value="odin_drone/configs/odin_drone.ron")]
    config: String,
}

lazy_static! { static ref ARGS: CliOpts = CliOpts::parse(); }

struct Monitor {
    json: bool,
}

impl DroneListener for Monitor {
    fn on_update (&mut self, objects: &[TrackedObject]) {
        if self.json {
            match serde_json::to_string( objects) {
                Ok(s) => println!("{s}"),
                Err(e) => warn!("failed to serialize snapshot: {e}")
            }
        } else {
            println!("--- {} objects", objects.len());
            for o in objects { println!("  {o}") }
        }
    }

    fn on_zone_event (&mut self, event: &ZoneEvent) {
        println!("!!! {event}");
    }

    fn on_connection (&mut self, state: ConnectionState) {
        println!("### {:?}", state);
    }
}

fn parse_zone (s: &str)->Result<ZoneSpec> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 4 {
        return Err( anyhow!("invalid zone spec '{s}', expected <name>:<lat>:<lon>:<radius>"))
    }
    let center = LatLon::new( parts[1].parse()?, parts[2].parse()?);
    Ok( ZoneSpec::new( parts[0], "red", center, parts[3].parse()?) )
}

async fn add_local_zones (zones: &SharedZones)->Result<()> {
    let store = MemoryZoneStore::new();
    for s in &ARGS.zone {
        store.create( parse_zone(s)?).await?;
    }
    sync_zones( &store, zones).await?;
    Ok(())
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::from_default_env())
        .init();

    let config: DroneConfig = load_config( &ARGS.config)?;
    let zones = new_shared_zones();

    if let Some(zs_config) = &config.zone_service {
        let store = FallbackZoneStore::from_config( zs_config)?;
        let zones = zones.clone();
        tokio::spawn( async move {
            let mut timer = interval( ZONE_SYNC_INTERVAL);
            loop {
                timer.tick().await;
                match sync_zones( &store, &zones).await {
                    Ok(n) => info!("synchronized {n} zones"),
                    Err(e) => warn!("zone synchronization failed: {e}")
                }
            }
        });
    } else if !ARGS.zone.is_empty() {
        add_local_zones( &zones).await?;
    }

    let mut subscription = DroneSubscription::from_config( &config, zones, Monitor{ json: ARGS.json })?;
    info!("monitoring drones, terminate with ctrl-c");

    tokio::signal::ctrl_c().await?;
    subscription.stop();
    Ok(())
}
