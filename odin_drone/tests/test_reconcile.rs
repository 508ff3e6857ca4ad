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

use std::collections::HashSet;
use chrono::{DateTime,Utc};
use serde_json::json;
use odin_drone::{Classification, ClassificationPolicy, LatLon, Reconciler, pruner::StalenessPolicy};

fn t (millis: i64)->DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis( 1_760_000_000_000 + millis).unwrap()
}

fn reconciler()->Reconciler {
    Reconciler::new( ClassificationPolicy::default(), StalenessPolicy::default())
}

fn frame (cam_id: &str, objects: serde_json::Value)->String {
    json!({ "fram_id": "F", "cam_id": cam_id, "timestamp": "2025-10-16T00:00:00Z", "objects": objects }).to_string()
}

fn report (id: &str, lat: f64, lng: f64)->String {
    frame( "CAM-1", json!([ {"obj_id": id, "lat": lat, "lng": lng, "alt": 50.0, "speed_kt": 12.0} ]))
}

/// feed a report for `id` every 500ms and run a sweep every second. Returns the time of eviction (if any)
fn run_track (r: &mut Reconciler, id: &str, until: i64, pos_at: impl Fn(i64)->(f64,f64))->Option<i64> {
    let mut time = 0;
    while time <= until {
        let (lat,lng) = pos_at(time);
        r.process_text( &report( id, lat, lng), t(time)).unwrap();
        if time % 1000 == 0 {
            let res = r.prune( &[], t(time));
            if res.evicted.iter().any( |o| o.id == id) {
                return Some(time)
            }
        }
        time += 500;
    }
    None
}

// run with "cargo test test_uniqueness -- --nocapture"
#[test]
fn test_uniqueness() {
    let mut r = reconciler();
    let msg = frame( "CAM-1", json!([
        {"obj_id": "A", "lat": 10.0, "lng": 100.0},
        {"obj_id": "B", "lat": 10.1, "lng": 100.1},
        {"obj_id": "A", "lat": 10.2, "lng": 100.2},
    ]));
    r.process_text( &msg, t(0)).unwrap();
    r.process_text( &report( "B", 10.3, 100.3), t(100)).unwrap();
    r.process_text( &report( "A", 10.4, 100.4), t(200)).unwrap();

    let snapshot = r.snapshot();
    println!("snapshot: {:?}", snapshot.iter().map(|o| &o.id).collect::<Vec<_>>());
    let ids: HashSet<&str> = snapshot.iter().map( |o| o.id.as_str()).collect();
    assert_eq!( snapshot.len(), 2);
    assert_eq!( ids.len(), 2);
}

#[test]
fn test_last_write_wins() {
    let mut r = reconciler();
    r.process_text( &frame( "CAM-1", json!([{"obj_id": "A", "lat": 10.0, "lng": 100.0, "speed_kt": 5.0, "image_path": "/a.jpg"}])), t(0)).unwrap();
    r.process_text( &frame( "CAM-2", json!([{"obj_id": "A", "lat": 11.0, "lng": 101.0, "speed_kt": 7.0}])), t(1000)).unwrap();

    let snapshot = r.snapshot();
    assert_eq!( snapshot.len(), 1);
    let a = &snapshot[0];
    println!("{a}");
    assert_eq!( a.position, LatLon::new( 11.0, 101.0));
    assert!( (a.speed_kt() - 7.0).abs() < 1e-9);
    assert_eq!( a.source_cam_id.as_deref(), Some("CAM-2"));
    assert!( a.image_ref.is_none()); // full replacement, no field merge
    assert_eq!( a.last_update, t(1000));
}

#[test]
fn test_stationary_eviction() {
    let mut r = reconciler();
    let evicted_at = run_track( &mut r, "S1", 20_000, |_| (13.75, 100.5));
    println!("stationary object evicted at {:?}", evicted_at);

    // stationary since the second report (500ms), so the timeout expires after 10500ms
    assert_eq!( evicted_at, Some(11_000));
}

#[test]
fn test_jitter_tolerance() {
    let mut r = reconciler();
    // about +-0.45m around a fixed point
    let evicted_at = run_track( &mut r, "J1", 20_000, |time| {
        if (time / 500) % 2 == 0 { (13.750004, 100.5) } else { (13.749996, 100.5) }
    });
    println!("jittering object evicted at {:?}", evicted_at);
    assert_eq!( evicted_at, Some(11_000));
}

#[test]
fn test_movement_resets_timeout() {
    let mut r = reconciler();
    // moves ~110m at 5000ms and stays at the new position afterwards
    let evicted_at = run_track( &mut r, "M1", 30_000, |time| {
        if time < 5_000 { (13.75, 100.5) } else { (13.751, 100.5) }
    });
    println!("moved object evicted at {:?}", evicted_at);

    // stationary again since 5500ms
    assert_eq!( evicted_at, Some(16_000));
}

#[test]
fn test_silence_eviction() {
    let mut r = reconciler();
    r.process_text( &report( "Q1", 13.75, 100.5), t(0)).unwrap();
    assert!( r.store().movement("Q1").unwrap().stationary_since.is_none());

    for time in (1_000..=10_000).step_by(1_000) {
        let res = r.prune( &[], t(time));
        assert!( res.evicted.is_empty(), "evicted too early at {time}");
    }

    let res = r.prune( &[], t(11_000));
    assert_eq!( res.evicted.len(), 1);
    assert_eq!( res.evicted[0].id, "Q1");
    assert!( r.snapshot().is_empty());
    assert!( r.store().movement("Q1").is_none());
}

#[test]
fn test_identifier_fallback() {
    let mut r = reconciler();
    let changed = r.process_text( r#"{"type":"drone","latitude":13.0,"longitude":100.0}"#, t(0)).unwrap();
    assert!( changed);

    let snapshot = r.snapshot();
    assert_eq!( snapshot.len(), 1);
    assert_eq!( snapshot[0].id, "unknown");
}

#[test]
fn test_three_frame_scenario() {
    let mut r = reconciler();
    let positions = [(10.000, 100.000), (10.000, 100.000), (10.0001, 100.0001)];

    for (i,(lat,lng)) in positions.iter().enumerate() {
        let time = i as i64 * 1000;
        r.process_text( &report( "X1", *lat, *lng), t(time)).unwrap();
        let res = r.prune( &[], t(time));
        assert!( res.evicted.is_empty());
    }

    let snapshot = r.snapshot();
    assert_eq!( snapshot.len(), 1);
    assert_eq!( snapshot[0].id, "X1");
    assert_eq!( snapshot[0].position, LatLon::new( 10.0001, 100.0001));
    assert!( r.store().movement("X1").unwrap().stationary_since.is_none());
}

#[test]
fn test_invalid_positions_are_tracked_but_not_rendered() {
    let mut r = reconciler();
    r.process_text( &frame( "CAM-1", json!([{"obj_id": "Z", "lat": 0, "lng": 0}, {"obj_id": "N", "lat": "n/a"}])), t(0)).unwrap();

    assert_eq!( r.store().len(), 2);
    assert!( r.snapshot().is_empty());
    assert!( r.store().movement("Z").is_none());

    // a later valid report merges into the same slot
    r.process_text( &report( "Z", 13.0, 100.0), t(500)).unwrap();
    assert_eq!( r.store().len(), 2);
    assert_eq!( r.snapshot().len(), 1);
    assert!( r.store().movement("Z").is_some());

    // the invalid one still goes stale
    let res = r.prune( &[], t(10_400));
    assert_eq!( res.evicted.len(), 1);
    assert_eq!( res.evicted[0].id, "N");
}

#[test]
fn test_classification_modes() {
    let now = t(0);
    let msg = frame( "CAM-1", json!([
        {"obj_id": "DRN-2201", "lat": 13.73, "lng": 100.52},
        {"obj_id": "DRN-2203", "lat": 13.78, "lng": 100.48},
        {"obj_id": "DRN-2204", "lat": 13.68, "lng": 100.63, "type": "hostile uav"},
        {"obj_id": "DRN-2205", "lat": 13.70, "lng": 100.57, "status": "friend"},
        {"obj_id": "DRN-2206", "lat": 13.71, "lng": 100.58, "objective": "our"},
    ]));

    let classes = |r: &Reconciler| {
        let mut v: Vec<(String,Classification)> = r.snapshot().into_iter().map( |o| (o.id, o.classification)).collect();
        v.sort_by( |a,b| a.0.cmp(&b.0));
        v.into_iter().map( |(_,c)| c).collect::<Vec<_>>()
    };

    let mut r = Reconciler::new( ClassificationPolicy::default(), StalenessPolicy::default());
    r.process_text( &msg, now).unwrap();
    assert_eq!( classes(&r), vec![
        Classification::Unknown, Classification::Unknown, Classification::Hostile, Classification::Friend, Classification::Friend
    ]);

    let mut r = Reconciler::new( ClassificationPolicy::hostile_unless_allowed( ["DRN-2203"]), StalenessPolicy::default());
    r.process_text( &msg, now).unwrap();
    assert_eq!( classes(&r), vec![
        Classification::Hostile, Classification::Friend, Classification::Hostile, Classification::Friend, Classification::Friend
    ]);
}

#[test]
fn test_malformed_and_ignored_messages() {
    let mut r = reconciler();
    assert!( r.process_text( "{\"objects\": [", t(0)).is_err());
    assert!( !r.process_text( r#"{"type":"hello","ok":true}"#, t(0)).unwrap());
    assert!( !r.process_value( &json!({"something": "else"}), t(0)));
    assert_eq!( r.store().len(), 0);
}

#[test]
fn test_poll_batch() {
    let mut r = reconciler();
    let batch = json!([
        {"id": "DRN-1", "lastSeenAt": "2025-10-16T00:00:00Z", "lastLat": 13.73, "lastLon": 100.52, "lastAltM": 100.0, "lastSpeedMS": 10.0, "lastHeadingDeg": 45.0},
        {"id": "DRN-2", "callsign": "HAWK-3", "status": "FRIEND", "speedKt": 220.0, "headingDeg": 40.0, "position": [13.78, 100.48]}
    ]);
    assert!( r.process_batch( &batch, t(0)));

    let d1 = r.store().get("DRN-1").unwrap();
    assert_eq!( d1.display_name, "DRN-1");
    assert!( (d1.speed_mps() - 10.0).abs() < 1e-9);
    assert_eq!( d1.heading, 45.0);

    let d2 = r.store().get("DRN-2").unwrap();
    assert_eq!( d2.display_name, "HAWK-3");
    assert_eq!( d2.classification, Classification::Friend);
    assert_eq!( d2.position, LatLon::new( 13.78, 100.48));

    let v = serde_json::to_value( d1).unwrap();
    println!("{v}");
    assert!( (v["altitudeFt"].as_f64().unwrap() - 328.084).abs() < 1e-2);
    assert_eq!( v["position"], json!([13.73, 100.52]));

    assert!( !r.process_batch( &json!({"error": "not an array"}), t(500)));
}
