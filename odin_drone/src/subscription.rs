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

use std::{sync::{Arc,Mutex}, time::Duration};
use chrono::Utc;
use tokio::{select, sync::mpsc, task::JoinHandle, time::{self,Instant,MissedTickBehavior}};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info};
use crate::{
    TrackedObject,
    config::DroneConfig,
    errors::Result,
    frames::SharedFrames,
    geofence::ZoneEvent,
    reconciler::Reconciler,
    source::{self,DroneSource,SourceInput},
    zones::{SharedZones,zone_list},
};

const SOURCE_QUEUE_LEN: usize = 256;

/// lower bound for the prune timer period, which can't be zero
pub const MIN_PRUNE_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected
}

/// the callback interface of a subscription. Each `on_update` gets the complete renderable snapshot
/// (not a delta). Calls are made from the subscription task, so implementations should not block
pub trait DroneListener: Send + 'static {
    fn on_update (&mut self, objects: &[TrackedObject]);

    fn on_zone_event (&mut self, event: &ZoneEvent) {}

    fn on_connection (&mut self, state: ConnectionState) {}
}

/// adapter for listeners that are only interested in snapshots
pub struct UpdateListener<F>(F);

impl<F> DroneListener for UpdateListener<F> where F: FnMut(&[TrackedObject]) + Send + 'static {
    fn on_update (&mut self, objects: &[TrackedObject]) { (self.0)(objects) }
}

pub fn update_listener<F> (f: F)->UpdateListener<F> where F: FnMut(&[TrackedObject]) + Send + 'static {
    UpdateListener(f)
}

// the listener slot is emptied by stop(), which is how we guarantee there are no more calls afterwards
type ListenerSlot = Arc<Mutex<Option<Box<dyn DroneListener>>>>;

/// a running drone subscription. Dropping it stops the subscription
pub struct DroneSubscription {
    cancel: CancellationToken,
    listener: ListenerSlot,
    task: Option<JoinHandle<()>>,
    source_task: Option<JoinHandle<()>>,
    frames: SharedFrames,
}

impl DroneSubscription {
    /// start a subscription with an explicit source. This has to be called from within a tokio runtime
    pub fn start<L> (config: &DroneConfig, source: Box<dyn DroneSource>, zones: SharedZones, listener: L)->Self where L: DroneListener {
        let cancel = CancellationToken::new();
        let listener: ListenerSlot = Arc::new( Mutex::new( Some( Box::new(listener))));
        let reconciler = Reconciler::from_config( config);
        let frames = reconciler.frames().clone();

        let (tx,rx) = mpsc::channel::<SourceInput>( SOURCE_QUEUE_LEN);
        let source_task = tokio::spawn( source.run( tx, cancel.child_token()));

        let task = tokio::spawn( run_subscription( reconciler, rx, zones, listener.clone(), config.prune_interval.max( MIN_PRUNE_INTERVAL), cancel.clone()));

        DroneSubscription { cancel, listener, task: Some(task), source_task: Some(source_task), frames }
    }

    /// start a subscription with the source specified in `config`
    pub fn from_config<L> (config: &DroneConfig, zones: SharedZones, listener: L)->Result<Self> where L: DroneListener {
        let source = source::from_config( &config.source)?;
        Ok( DroneSubscription::start( config, source, zones, listener) )
    }

    /// terminate transport and prune timer. The listener will not be called after this returns.
    /// Calling this more than once is harmless, calling it from within a listener callback is not
    pub fn stop (&mut self) {
        if let Ok(mut slot) = self.listener.lock() { // waits for a listener call in progress
            slot.take();
        }
        self.cancel.cancel();

        if let Some(task) = self.task.take() { task.abort() }
        self.source_task.take(); // not aborted - it has to send the websocket close frame after cancellation
    }

    pub fn is_stopped (&self)->bool { self.cancel.is_cancelled() }

    /// the camera frame cache of this subscription
    pub fn frames (&self)->&SharedFrames { &self.frames }
}

impl Drop for DroneSubscription {
    fn drop (&mut self) {
        self.stop()
    }
}

fn notify (listener: &ListenerSlot, f: impl FnOnce(&mut dyn DroneListener)) {
    if let Ok(mut slot) = listener.lock() {
        if let Some(l) = slot.as_mut() {
            f( l.as_mut())
        }
    }
}

fn notify_snapshot (listener: &ListenerSlot, reconciler: &Reconciler) {
    let snapshot = reconciler.snapshot();
    notify( listener, |l| l.on_update( &snapshot));
}

fn notify_events (listener: &ListenerSlot, events: &[ZoneEvent]) {
    if !events.is_empty() {
        notify( listener, |l| {
            for e in events { l.on_zone_event(e) }
        });
    }
}

async fn run_subscription (mut reconciler: Reconciler, mut rx: mpsc::Receiver<SourceInput>, zones: SharedZones,
                           listener: ListenerSlot, prune_interval: Duration, cancel: CancellationToken) {
    let mut prune_timer = time::interval_at( Instant::now() + prune_interval, prune_interval);
    prune_timer.set_missed_tick_behavior( MissedTickBehavior::Delay);
    let mut source_done = false;

    loop {
        select! {
            _ = cancel.cancelled() => break,

            maybe_input = rx.recv(), if !source_done => {
                match maybe_input {
                    Some(input) => process_input( &mut reconciler, input, &zones, &listener),
                    None => {
                        info!("drone source terminated");
                        source_done = true; // keep pruning so that remaining objects go stale
                    }
                }
            }

            _ = prune_timer.tick() => {
                let now = Utc::now();
                let zone_set = zone_list( &zones);
                let res = reconciler.prune( &zone_set, now);
                if res.has_evictions() {
                    debug!("pruned {} objects", res.evicted.len());
                    notify_snapshot( &listener, &reconciler);
                    notify_events( &listener, &res.events);
                }
                // also picks up zone changes if no messages come in
                let events = reconciler.evaluate_zones( &zone_set, now);
                notify_events( &listener, &events);
            }
        }
    }

    reconciler.clear();
    debug!("subscription terminated");
}

fn process_input (reconciler: &mut Reconciler, input: SourceInput, zones: &SharedZones, listener: &ListenerSlot) {
    let now = Utc::now();
    let changed = match input {
        SourceInput::Message(text) => {
            match reconciler.process_text( &text, now) {
                Ok(changed) => changed,
                Err(e) => {
                    debug!("dropping malformed message: {}", e);
                    false
                }
            }
        }
        SourceInput::Batch(v) => reconciler.process_batch( &v, now),
        SourceInput::Connected => {
            notify( listener, |l| l.on_connection( ConnectionState::Connected));
            false
        }
        SourceInput::Disconnected => {
            notify( listener, |l| l.on_connection( ConnectionState::Disconnected));
            false
        }
    };

    if changed {
        notify_snapshot( listener, reconciler);
        let events = reconciler.evaluate_zones( &zone_list( zones), now);
        notify_events( listener, &events);
    }
}
