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

use std::time::Duration;
use odin_drone::{
    LatLon, ZoneServiceConfig, ZoneSpec, ZoneStore,
    errors::OdinDroneError,
    zones::{FallbackZoneStore, MemoryZoneStore, new_shared_zones, sync_zones},
};

// run with "cargo test test_memory_store -- --nocapture"
#[tokio::test]
async fn test_memory_store() {
    let store = MemoryZoneStore::new();

    let z1 = store.create( ZoneSpec::new( "base", "#ff0000", LatLon::new( 13.75, 100.5), 500.0)).await.unwrap();
    let z2 = store.create( ZoneSpec::new( "gate", "blue", LatLon::new( 13.76, 100.51), 50.0)).await.unwrap();
    println!("{z1}\n{z2}");
    assert!( z1.id.starts_with("MARK-"));
    assert_ne!( z1.id, z2.id);
    assert!( z1.created_at.is_some());

    let list = store.list().await.unwrap();
    assert_eq!( list.len(), 2);

    let z1u = store.update( &z1.id, None, None, None, Some(750.0)).unwrap();
    assert_eq!( z1u.radius_meters, 750.0);
    assert_eq!( z1u.name, "base");
    assert_eq!( z1u.created_at, z1.created_at);
    assert!( matches!( store.update( &z1.id, None, None, None, Some(-1.0)), Err(OdinDroneError::InvalidZone(_))));

    store.delete( &z1.id).await.unwrap();
    assert!( matches!( store.delete( &z1.id).await, Err(OdinDroneError::NotFound(_))));
    assert_eq!( store.len(), 1);

    store.clear();
    assert!( store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_zone_validation() {
    let store = MemoryZoneStore::new();
    let invalid = [
        ZoneSpec::new( "", "red", LatLon::new( 1.0, 2.0), 10.0),
        ZoneSpec::new( "x", " ", LatLon::new( 1.0, 2.0), 10.0),
        ZoneSpec::new( "x", "red", LatLon::new( f64::NAN, 2.0), 10.0),
        ZoneSpec::new( "x", "red", LatLon::new( 1.0, 2.0), 0.0),
        ZoneSpec::new( "x", "red", LatLon::new( 1.0, 2.0), f64::INFINITY),
    ];
    for spec in invalid {
        let res = store.create( spec.clone()).await;
        println!("{spec:?} -> {res:?}");
        assert!( matches!( res, Err(OdinDroneError::InvalidZone(_))));
    }
    assert_eq!( store.len(), 0);
}

#[tokio::test]
async fn test_fallback_when_unreachable() {
    // nothing listens on the discard port
    let config = ZoneServiceConfig { base_uri: "http://127.0.0.1:9".into(), timeout: Duration::from_secs(2) };
    let store = FallbackZoneStore::from_config( &config).unwrap();

    let zone = store.create( ZoneSpec::new( "base", "red", LatLon::new( 13.75, 100.5), 500.0)).await.unwrap();
    assert!( zone.id.starts_with("MARK-"));
    assert_eq!( store.memory().len(), 1);

    let list = store.list().await.unwrap();
    assert_eq!( list.len(), 1);
    assert_eq!( list[0].id, zone.id);

    // validation is not bypassed by the fallback
    assert!( store.create( ZoneSpec::new( "bad", "red", LatLon::new( 1.0, 2.0), -1.0)).await.is_err());

    let shared = new_shared_zones();
    assert_eq!( sync_zones( &store, &shared).await.unwrap(), 1);
    assert!( shared.contains_key( &zone.id));

    store.delete( &zone.id).await.unwrap();
    assert!( store.list().await.unwrap().is_empty());

    sync_zones( &store, &shared).await.unwrap();
    assert!( shared.is_empty());
}
