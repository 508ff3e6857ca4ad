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

use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub type Result<T> = std::result::Result<T,OdinDroneError>;

#[derive(Error,Debug)]
pub enum OdinDroneError {

    #[error("parse error {0}")]
    ParseError(String),

    #[error("JSON error {0}")]
    JsonError( #[from] serde_json::Error),

    #[error("config error {0}")]
    ConfigError( #[from] ron::error::SpannedError),

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("http error {0}")]
    HttpError( #[from] reqwest::Error),

    #[error("websocket error {0}")]
    WsError( #[from] tungstenite::Error),

    #[error("URL error {0}")]
    UrlError( #[from] url::ParseError),

    #[error("invalid zone: {0}")]
    InvalidZone(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service responded with status {0}")]
    StatusError(u16),

    // generic error
    #[error("operation failed: {0}")]
    OpFailed(String)
}

pub fn op_failed (msg: impl ToString)->OdinDroneError {
    OdinDroneError::OpFailed(msg.to_string())
}

macro_rules! parse_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        OdinDroneError::ParseError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use parse_error;
