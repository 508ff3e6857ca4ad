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

//! metadata of camera detection frames. This is pure pass-through storage for clients that want to
//! show camera details next to the tracked objects, it does not take part in reconciliation

use std::sync::Arc;
use chrono::{DateTime,Utc};
use dashmap::DashMap;
use serde::{Serialize,Deserialize};
use serde_json::Value;

/// the latest frame per camera id
pub type SharedFrames = Arc<DashMap<String,FrameInfo>>;

pub fn new_shared_frames()->SharedFrames { Arc::new( DashMap::new()) }

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize,Default)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize,Default)]
#[serde(default)]
pub struct CameraInfo {
    pub name: String,
    pub sort: String,
    pub location: String,
    pub institute: String,
}

#[derive(Debug,Clone,PartialEq,Serialize)]
#[serde(rename_all="camelCase")]
pub struct FrameInfo {
    pub frame_id: Option<String>,
    pub cam_id: String,
    pub timestamp: Option<String>,
    pub image_info: Option<ImageInfo>,
    pub camera_info: Option<CameraInfo>,
    pub object_count: usize,
    pub received_at: DateTime<Utc>,
}

impl FrameInfo {
    /// extract frame level metadata from a frame envelope. Returns None if the envelope does not carry a camera id
    pub fn from_envelope (msg: &Value, now: DateTime<Utc>)->Option<Self> {
        let cam_id = str_field( msg, &["cam_id", "source_id"])?;
        let frame_id = str_field( msg, &["fram_id", "frame_id"]);
        let timestamp = str_field( msg, &["timestamp"]);

        let image_info = msg.get("image_info").and_then( |v| {
            let width = u32::try_from( v.get("width")?.as_u64()?).ok()?;
            let height = u32::try_from( v.get("height")?.as_u64()?).ok()?;
            Some( ImageInfo{width,height})
        });

        let camera_info = msg.get("token_id")
            .and_then( |t| t.get("camera_info"))
            .and_then( |v| serde_json::from_value::<CameraInfo>( v.clone()).ok());

        let object_count = msg.get("objects").and_then( |v| v.as_array()).map( |a| a.len()).unwrap_or(0);

        Some( FrameInfo { frame_id, cam_id, timestamp, image_info, camera_info, object_count, received_at: now })
    }
}

fn str_field (v: &Value, keys: &[&str])->Option<String> {
    keys.iter()
        .filter_map( |k| v.get(*k))
        .filter_map( |v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None
        })
        .next()
}
