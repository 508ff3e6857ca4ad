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

//! circular zones ("marks") and their persistence. The geofence watcher only reads the [`SharedZones`]
//! set, how that set is populated (remote service, in-memory store or directly) is up to the application

use std::{sync::{Arc,Mutex}, fmt};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Serialize,Deserialize};
use serde_json::{Value,json};
use reqwest::{Client,Response,StatusCode};
use async_trait::async_trait;
use url::Url;
use rand::Rng;
use tracing::{debug,warn};
use uom::si::length::meter;
use crate::{
    LatLon, haversine_distance,
    config::ZoneServiceConfig,
    errors::{OdinDroneError,Result,op_failed,parse_error}
};

/* #region zone types *********************************************************************************/

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub color: String, // display only

    #[serde(rename="pos")]
    pub center: LatLon,

    #[serde(rename="radius")]
    pub radius_meters: f64,

    #[serde(rename="createdAt", default, skip_serializing_if="Option::is_none")]
    pub created_at: Option<String>,
}

impl Zone {
    /// zones with a non-positive or non-finite radius (or a non-finite center) are never evaluated.
    /// Note that a center at 0,0 is perfectly fine for a zone
    pub fn is_evaluable (&self)->bool {
        self.radius_meters.is_finite() && self.radius_meters > 0.0
            && self.center.lat.is_finite() && self.center.lng.is_finite()
    }

    pub fn contains (&self, pos: &LatLon)->bool {
        haversine_distance( &self.center, pos).get::<meter>() <= self.radius_meters
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zone( id: {}, name: \"{}\", center: {}, radius: {}m)", self.id, self.name, self.center, self.radius_meters)
    }
}

/// what clients provide to create a new zone
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct ZoneSpec {
    pub name: String,
    pub color: String,

    #[serde(rename="pos")]
    pub center: LatLon,

    #[serde(rename="radius")]
    pub radius_meters: f64,
}

impl ZoneSpec {
    pub fn new (name: impl ToString, color: impl ToString, center: LatLon, radius_meters: f64)->Self {
        ZoneSpec { name: name.to_string(), color: color.to_string(), center, radius_meters }
    }

    pub fn validate (&self)->Result<()> {
        if self.name.trim().is_empty() {
            Err( OdinDroneError::InvalidZone("missing name".into()))
        } else if self.color.trim().is_empty() {
            Err( OdinDroneError::InvalidZone("missing color".into()))
        } else if !(self.center.lat.is_finite() && self.center.lng.is_finite()) {
            Err( OdinDroneError::InvalidZone( format!("invalid center {}", self.center)))
        } else if !(self.radius_meters.is_finite() && self.radius_meters > 0.0) {
            Err( OdinDroneError::InvalidZone( format!("invalid radius {}", self.radius_meters)))
        } else {
            Ok(())
        }
    }

    fn into_zone (self, id: String, created_at: Option<String>)->Zone {
        Zone { id, name: self.name, color: self.color, center: self.center, radius_meters: self.radius_meters, created_at }
    }
}

/// the zone set that is read by the geofence watcher, keyed by zone id
pub type SharedZones = Arc<DashMap<String,Zone>>;

pub fn new_shared_zones()->SharedZones { Arc::new( DashMap::new()) }

pub fn zone_list (zones: &SharedZones)->Vec<Zone> {
    zones.iter().map( |e| e.value().clone()).collect()
}

/// replace the contents of `shared` with what is currently in `store`
pub async fn sync_zones (store: &dyn ZoneStore, shared: &SharedZones)->Result<usize> {
    let list = store.list().await?;
    shared.retain( |id,_| list.iter().any( |z| &z.id == id));
    let n = list.len();
    for zone in list {
        shared.insert( zone.id.clone(), zone);
    }
    Ok(n)
}

/* #endregion zone types */

/// abstraction of the zone persistence service
#[async_trait]
pub trait ZoneStore: Send + Sync {
    async fn list (&self)->Result<Vec<Zone>>;
    async fn create (&self, spec: ZoneSpec)->Result<Zone>;

    /// returns `NotFound` if there is no zone with this id
    async fn delete (&self, id: &str)->Result<()>;
}

/* #region in-memory store ****************************************************************************/

/// process local zone store. This is what we use if there is no zone service or it is not reachable
#[derive(Debug,Default)]
pub struct MemoryZoneStore {
    zones: Mutex<Vec<Zone>>,
}

impl MemoryZoneStore {
    pub fn new()->Self { MemoryZoneStore::default() }

    /// change the provided fields of an existing zone (id and creation time stay the same)
    pub fn update (&self, id: &str, name: Option<String>, color: Option<String>, center: Option<LatLon>, radius_meters: Option<f64>)->Result<Zone> {
        let mut zones = self.zones.lock().map_err( |_| op_failed("zone store poisoned"))?;
        let zone = zones.iter_mut().find( |z| z.id == id).ok_or_else( || OdinDroneError::NotFound( id.to_string()))?;

        let mut spec = ZoneSpec { name: zone.name.clone(), color: zone.color.clone(), center: zone.center, radius_meters: zone.radius_meters };
        if let Some(name) = name { spec.name = name }
        if let Some(color) = color { spec.color = color }
        if let Some(center) = center { spec.center = center }
        if let Some(radius) = radius_meters { spec.radius_meters = radius }
        spec.validate()?;

        *zone = spec.into_zone( zone.id.clone(), zone.created_at.clone());
        Ok( zone.clone() )
    }

    pub fn clear (&self) {
        if let Ok(mut zones) = self.zones.lock() {
            zones.clear();
        }
    }

    pub fn len (&self)->usize {
        self.zones.lock().map( |zones| zones.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ZoneStore for MemoryZoneStore {
    async fn list (&self)->Result<Vec<Zone>> {
        let zones = self.zones.lock().map_err( |_| op_failed("zone store poisoned"))?;
        Ok( zones.clone() )
    }

    async fn create (&self, spec: ZoneSpec)->Result<Zone> {
        spec.validate()?;
        let zone = spec.into_zone( new_zone_id(), Some( Utc::now().to_rfc3339()));

        let mut zones = self.zones.lock().map_err( |_| op_failed("zone store poisoned"))?;
        zones.push( zone.clone());
        Ok(zone)
    }

    async fn delete (&self, id: &str)->Result<()> {
        let mut zones = self.zones.lock().map_err( |_| op_failed("zone store poisoned"))?;
        if let Some(idx) = zones.iter().position( |z| z.id == id) {
            zones.remove(idx);
            Ok(())
        } else {
            Err( OdinDroneError::NotFound( id.to_string()))
        }
    }
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `MARK-<epoch millis>-<7 random base36 chars>`
pub fn new_zone_id()->String {
    let mut rng = rand::rng();
    let suffix: String = (0..7).map( |_| BASE36[ rng.random_range(0..BASE36.len())] as char).collect();
    format!("MARK-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/* #endregion in-memory store */

/* #region remote store *******************************************************************************/

/// client for a REST zone service with endpoints
/// ```text
///   GET    {base}/marks        -> [ {id,name,color,pos|latDeg+lonDeg,radius|radiusM,createdAt}, .. ]
///   POST   {base}/marks        <- {name,color,pos,radius}
///   DELETE {base}/marks/{id}
/// ```
#[derive(Debug,Clone)]
pub struct RemoteZoneStore {
    client: Client,
    base: Url,
}

impl RemoteZoneStore {
    pub fn new (config: &ZoneServiceConfig)->Result<Self> {
        let client = Client::builder().timeout( config.timeout).build()?;
        let base = Url::parse( &config.base_uri)?;
        Ok( RemoteZoneStore { client, base } )
    }

    fn marks_url (&self, id: Option<&str>)->Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err( |_| op_failed( format!("not a base uri: {}", self.base)))?;
            segments.pop_if_empty().push("marks");
            if let Some(id) = id {
                segments.push(id); // this does percent encoding
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ZoneStore for RemoteZoneStore {
    async fn list (&self)->Result<Vec<Zone>> {
        let response = check_status( self.client.get( self.marks_url(None)?).send().await?)?;
        let v: Value = response.json().await?;

        if let Some(list) = v.as_array() {
            let mut zones = Vec::with_capacity( list.len());
            for rec in list {
                match zone_from_record( rec) {
                    Ok(zone) => zones.push(zone),
                    Err(e) => warn!("ignoring zone record: {}", e)
                }
            }
            Ok(zones)
        } else {
            Ok( Vec::new() )
        }
    }

    async fn create (&self, spec: ZoneSpec)->Result<Zone> {
        spec.validate()?;
        let body = json!({
            "name": spec.name,
            "color": spec.color,
            "pos": [spec.center.lat, spec.center.lng],
            "radius": spec.radius_meters,
        });
        let response = check_status( self.client.post( self.marks_url(None)?).json( &body).send().await?)?;
        let v: Value = response.json().await?;
        zone_from_record( &v)
    }

    async fn delete (&self, id: &str)->Result<()> {
        let response = self.client.delete( self.marks_url( Some(id))?).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err( OdinDroneError::NotFound( id.to_string())),
            status if status.is_success() => Ok(()),
            status => Err( OdinDroneError::StatusError( status.as_u16()))
        }
    }
}

fn check_status (response: Response)->Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err( OdinDroneError::StatusError( status.as_u16()))
    }
}

/// normalize a backend zone record, which can use either `pos` or `latDeg`/`lonDeg` for the center
/// and `radius` or `radiusM` for the radius
pub fn zone_from_record (rec: &Value)->Result<Zone> {
    let id = match rec.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err( parse_error!("zone record without id: {}", rec))
    };
    let name = rec.get("name").and_then( |v| v.as_str()).unwrap_or_default().to_string();
    let color = rec.get("color").and_then( |v| v.as_str()).unwrap_or_default().to_string();

    let center = match rec.get("pos").and_then( |v| v.as_array()) {
        Some(a) if a.len() == 2 => {
            let lat = a[0].as_f64().ok_or_else( || parse_error!("invalid zone pos in {}", id))?;
            let lng = a[1].as_f64().ok_or_else( || parse_error!("invalid zone pos in {}", id))?;
            LatLon::new( lat, lng)
        }
        _ => {
            let lat = rec.get("latDeg").and_then( |v| v.as_f64()).ok_or_else( || parse_error!("no zone position in {}", id))?;
            let lng = rec.get("lonDeg").and_then( |v| v.as_f64()).ok_or_else( || parse_error!("no zone position in {}", id))?;
            LatLon::new( lat, lng)
        }
    };

    let radius_meters = rec.get("radius").and_then( |v| v.as_f64()).filter( |r| *r != 0.0)
        .or_else( || rec.get("radiusM").and_then( |v| v.as_f64()))
        .ok_or_else( || parse_error!("no zone radius in {}", id))?;

    let created_at = rec.get("createdAt").and_then( |v| v.as_str()).map( |s| s.to_string());

    Ok( Zone { id, name, color, center, radius_meters, created_at } )
}

/* #endregion remote store */

/* #region fallback store *****************************************************************************/

/// a remote zone store that falls back to a process local store if the service is not available.
/// list and create fall back on any failure, delete only if the service could not be reached at all
pub struct FallbackZoneStore {
    remote: RemoteZoneStore,
    memory: MemoryZoneStore,
}

impl FallbackZoneStore {
    pub fn new (remote: RemoteZoneStore)->Self {
        FallbackZoneStore { remote, memory: MemoryZoneStore::new() }
    }

    pub fn from_config (config: &ZoneServiceConfig)->Result<Self> {
        Ok( FallbackZoneStore::new( RemoteZoneStore::new( config)?) )
    }

    pub fn memory (&self)->&MemoryZoneStore { &self.memory }
}

#[async_trait]
impl ZoneStore for FallbackZoneStore {
    async fn list (&self)->Result<Vec<Zone>> {
        match self.remote.list().await {
            Ok(zones) => Ok(zones),
            Err(e) => {
                debug!("zone service list failed ({}), using local zones", e);
                self.memory.list().await
            }
        }
    }

    async fn create (&self, spec: ZoneSpec)->Result<Zone> {
        spec.validate()?;
        match self.remote.create( spec.clone()).await {
            Ok(zone) => Ok(zone),
            Err(e) => {
                debug!("zone service create failed ({}), using local zones", e);
                self.memory.create( spec).await
            }
        }
    }

    async fn delete (&self, id: &str)->Result<()> {
        match self.remote.delete( id).await {
            Err(OdinDroneError::HttpError(e)) => {
                debug!("zone service not reachable ({}), deleting local zone", e);
                self.memory.delete( id).await
            }
            other => other
        }
    }
}

/* #endregion fallback store */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_record_normalization() {
        let z = zone_from_record( &json!({"id":"M1", "name":"base", "color":"#f00", "latDeg": 13.7, "lonDeg": 100.5, "radiusM": 250.0})).unwrap();
        assert_eq!( z.center, LatLon::new( 13.7, 100.5));
        assert_eq!( z.radius_meters, 250.0);
        assert!( z.created_at.is_none());

        let z = zone_from_record( &json!({"id":"M2", "name":"x", "color":"blue", "pos":[1.0, 2.0], "radius": 10, "createdAt":"2025-01-01T00:00:00Z"})).unwrap();
        assert_eq!( z.center, LatLon::new( 1.0, 2.0));
        assert_eq!( z.radius_meters, 10.0);
        assert_eq!( z.created_at.as_deref(), Some("2025-01-01T00:00:00Z"));

        assert!( zone_from_record( &json!({"name":"no id", "pos":[1.0,2.0], "radius": 10})).is_err());
        assert!( zone_from_record( &json!({"id":"M3", "pos":[1.0,2.0]})).is_err());
    }

    #[test]
    fn test_zone_id_format() {
        let id = new_zone_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!( parts.len(), 3);
        assert_eq!( parts[0], "MARK");
        assert!( parts[1].parse::<i64>().is_ok());
        assert_eq!( parts[2].len(), 7);
        assert!( parts[2].chars().all( |c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_marks_url() {
        let config = ZoneServiceConfig { base_uri: "http://localhost:3000/api/".into(), timeout: std::time::Duration::from_secs(1) };
        let store = RemoteZoneStore::new( &config).unwrap();
        assert_eq!( store.marks_url(None).unwrap().as_str(), "http://localhost:3000/api/marks");
        assert_eq!( store.marks_url( Some("MARK 1")).unwrap().as_str(), "http://localhost:3000/api/marks/MARK%201");
    }

    #[test]
    fn test_zone_serialization() {
        let zone = Zone { id: "M1".into(), name: "n".into(), color: "red".into(), center: LatLon::new(1.0,2.0), radius_meters: 5.0, created_at: None };
        let v = serde_json::to_value( &zone).unwrap();
        assert_eq!( v, json!({"id":"M1", "name":"n", "color":"red", "pos":[1.0,2.0], "radius":5.0}));
    }
}
