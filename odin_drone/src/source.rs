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

//! transports that feed raw drone data into a subscription. Each source runs in its own task and
//! hands over [`SourceInput`] values through a channel, which keeps the receiving side of the
//! subscription cancellation safe

use std::time::Duration;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tokio::{select, sync::mpsc, time::sleep};
use tokio_util::sync::CancellationToken;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug,info,warn};
use crate::{config::DroneSourceConfig, errors::{OdinDroneError,Result}};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug,Clone,PartialEq)]
pub enum SourceInput {
    /// a text message that still needs to be parsed (push)
    Message(String),
    /// a parsed poll result (pull)
    Batch(Value),
    Connected,
    Disconnected,
}

/// something that produces drone data until it is cancelled or the receiver goes away
#[async_trait]
pub trait DroneSource: Send + 'static {
    async fn run (self: Box<Self>, tx: mpsc::Sender<SourceInput>, cancel: CancellationToken);
}

/// create the source that is configured for a subscription
pub fn from_config (config: &DroneSourceConfig)->Result<Box<dyn DroneSource>> {
    match config {
        DroneSourceConfig::Push{url,reconnect_delay} => {
            Ok( Box::new( WsSource::new( url, reconnect_delay.unwrap_or( DEFAULT_RECONNECT_DELAY))) )
        }
        DroneSourceConfig::Pull{url,interval} => {
            Ok( Box::new( PollSource::new( url, *interval)?) )
        }
    }
}

/* #region push ***************************************************************************************/

/// persistent websocket connection that is re-established after `reconnect_delay` if it drops
pub struct WsSource {
    url: String,
    reconnect_delay: Duration,
}

impl WsSource {
    pub fn new (url: impl ToString, reconnect_delay: Duration)->Self {
        WsSource { url: url.to_string(), reconnect_delay }
    }
}

#[async_trait]
impl DroneSource for WsSource {
    async fn run (self: Box<Self>, tx: mpsc::Sender<SourceInput>, cancel: CancellationToken) {
        let mut reported_down = false; // only report state changes

        loop {
            let res = select! {
                _ = cancel.cancelled() => return,
                res = connect_async( self.url.as_str()) => res
            };

            match res {
                Ok((mut ws_stream,_)) => {
                    info!("connected to {}", self.url);
                    if tx.send( SourceInput::Connected).await.is_err() { return }
                    reported_down = false;

                    loop {
                        select! { // both branches are cancellation safe
                            _ = cancel.cancelled() => {
                                if let Err(e) = ws_stream.close(None).await {
                                    debug!("failed to close websocket: {}", e);
                                }
                                return
                            }
                            maybe_msg = ws_stream.next() => {
                                let input = match maybe_msg {
                                    Some(Ok(Message::Text(txt))) => SourceInput::Message( txt.as_str().to_string()),
                                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8( bytes.to_vec()) {
                                        Ok(txt) => SourceInput::Message(txt),
                                        Err(_) => { debug!("ignoring non-utf8 binary message"); continue }
                                    }
                                    Some(Ok(Message::Close(_))) | None => {
                                        warn!("server closed websocket, trying to reconnect..");
                                        break
                                    }
                                    Some(Ok(_)) => continue, // ping/pong are handled by tungstenite
                                    Some(Err(e)) => {
                                        warn!("reconnecting after failed websocket read: {}", e);
                                        break
                                    }
                                };
                                if tx.send( input).await.is_err() { return }
                            }
                        }
                    }

                    if tx.send( SourceInput::Disconnected).await.is_err() { return }
                    reported_down = true;
                }
                Err(e) => {
                    warn!("failed to connect to {}: {}", self.url, e);
                    if !reported_down {
                        if tx.send( SourceInput::Disconnected).await.is_err() { return }
                        reported_down = true;
                    }
                }
            }

            select! {
                _ = cancel.cancelled() => return,
                _ = sleep( self.reconnect_delay) => {}
            }
        }
    }
}

/* #endregion push */

/* #region pull ***************************************************************************************/

/// periodic GET of a JSON array. The next request is scheduled `interval` after the previous one
/// completed, failed requests are just logged
pub struct PollSource {
    client: Client,
    url: String,
    interval: Duration,
}

impl PollSource {
    pub fn new (url: impl ToString, interval: Duration)->Result<Self> {
        let client = Client::builder().build()?;
        let interval = interval.max( MIN_POLL_INTERVAL);
        Ok( PollSource { client, url: url.to_string(), interval } )
    }

    async fn fetch (&self)->Result<Value> {
        let response = self.client.get( self.url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err( OdinDroneError::StatusError( status.as_u16()))
        }
        Ok( response.json::<Value>().await? )
    }
}

#[async_trait]
impl DroneSource for PollSource {
    async fn run (self: Box<Self>, tx: mpsc::Sender<SourceInput>, cancel: CancellationToken) {
        loop {
            select! {
                _ = cancel.cancelled() => return,
                res = self.fetch() => match res {
                    Ok(v) => {
                        if tx.send( SourceInput::Batch(v)).await.is_err() { return }
                    }
                    Err(e) => debug!("polling {} failed: {}", self.url, e)
                }
            }

            select! {
                _ = cancel.cancelled() => return,
                _ = sleep( self.interval) => {}
            }
        }
    }
}

/* #endregion pull */

/* #region channel ************************************************************************************/

/// in-process source for applications that already have the data, and for tests
pub struct ChannelSource {
    rx: mpsc::Receiver<SourceInput>,
}

impl ChannelSource {
    pub fn new (rx: mpsc::Receiver<SourceInput>)->Self { ChannelSource{rx} }

    /// create a source together with the sender to feed it
    pub fn channel (capacity: usize)->(mpsc::Sender<SourceInput>, Self) {
        let (tx,rx) = mpsc::channel(capacity);
        (tx, ChannelSource::new(rx))
    }
}

#[async_trait]
impl DroneSource for ChannelSource {
    async fn run (self: Box<Self>, tx: mpsc::Sender<SourceInput>, cancel: CancellationToken) {
        let ChannelSource{ mut rx } = *self;
        loop {
            select! {
                _ = cancel.cancelled() => return,
                maybe_input = rx.recv() => match maybe_input {
                    Some(input) => {
                        if tx.send( input).await.is_err() { return }
                    }
                    None => return // feeder is gone
                }
            }
        }
    }
}

/* #endregion channel */
