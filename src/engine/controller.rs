use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    caption::{caption_or_fallback, CaptionService},
    capture::{CameraDevice, Facing, VideoRecorder},
    models::{CaptureId, Identity},
    room::{RemoteStore, RoomDelivery, RoomSubscription},
    settings::{CaptureMode, UserSettings},
};

use super::{AppSnapshot, AppState, Effect, EngineConfig, EngineEvent};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const EVENT_CAPACITY: usize = 64;

/// Everything outside the engine it has to talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RemoteStore>,
    pub device: Arc<dyn CameraDevice>,
    pub recorder: Option<Arc<dyn VideoRecorder>>,
    pub captioner: Option<Arc<dyn CaptionService>>,
}

#[derive(Debug, Clone, Copy)]
struct Preferences {
    facing: Facing,
    capture_mode: CaptureMode,
}

/// Drives [`AppState`]: serializes every input through one lock and carries
/// out the effects each transition returns.
#[derive(Clone)]
pub struct CameraController {
    state: Arc<Mutex<AppState>>,
    collaborators: Collaborators,
    subscription: Arc<Mutex<RoomSubscription>>,
    deliveries: mpsc::UnboundedSender<RoomDelivery>,
    events: broadcast::Sender<EngineEvent>,
    preferences: Arc<Mutex<Preferences>>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    shutdown: CancellationToken,
    capture_resolution: (u32, u32),
    sweep_interval: Duration,
}

impl CameraController {
    /// Builds the controller and starts its background workers. Must run inside a tokio runtime.
    pub async fn new(
        config: EngineConfig,
        settings: UserSettings,
        collaborators: Collaborators,
    ) -> Self {
        let capture_resolution = config.capture_resolution;
        let sweep_interval = config.presence_sweep_interval;

        let mut state = AppState::new(config, &settings.room_key);
        state.set_captions_enabled(settings.captions_enabled);

        let (deliveries, delivery_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let controller = Self {
            state: Arc::new(Mutex::new(state)),
            collaborators,
            subscription: Arc::new(Mutex::new(RoomSubscription::new())),
            deliveries,
            events,
            preferences: Arc::new(Mutex::new(Preferences {
                facing: settings.facing,
                capture_mode: settings.capture_mode,
            })),
            workers: Arc::new(Mutex::new(Vec::new())),
            shutdown: CancellationToken::new(),
            capture_resolution,
            sweep_interval,
        };

        let pump = tokio::spawn(controller.clone().pump_deliveries(delivery_rx));
        let sweeper = tokio::spawn(controller.clone().sweep_presence());
        controller.workers.lock().await.extend([pump, sweeper]);

        controller
    }

    pub async fn snapshot(&self) -> AppSnapshot {
        self.state.lock().await.snapshot()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // --- Device ---

    /// Requests the camera. Returns whether a live stream is now available.
    pub async fn power_on(&self) -> bool {
        {
            let mut state = self.state.lock().await;
            if !state.begin_power_on() {
                return state.device().is_on();
            }
        }
        self.emit(EngineEvent::StateChanged);

        let facing = self.preferences.lock().await.facing;
        let result = self
            .collaborators
            .device
            .acquire(facing, self.capture_resolution)
            .await;

        let (effects, stray, is_on) = {
            let mut state = self.state.lock().await;
            let (effects, stray) = state.device_acquired(result);
            (effects, stray, state.device().is_on())
        };
        if let Some(source) = stray {
            source.release();
        }
        if is_on {
            log_info!("camera on ({:?})", facing);
        }

        self.dispatch(effects);
        self.emit(EngineEvent::StateChanged);
        is_on
    }

    pub async fn power_off(&self) {
        let released = self.state.lock().await.power_off();
        if let Some(source) = released {
            source.release();
            log_info!("camera off");
        }
        self.emit(EngineEvent::StateChanged);
    }

    /// Switches lenses, reacquiring the stream if the camera is on.
    pub async fn set_facing(&self, facing: Facing) {
        {
            let mut preferences = self.preferences.lock().await;
            if preferences.facing == facing {
                return;
            }
            preferences.facing = facing;
        }

        if self.state.lock().await.device().is_on() {
            self.power_off().await;
            self.power_on().await;
        }
    }

    pub async fn set_capture_mode(&self, mode: CaptureMode) {
        self.preferences.lock().await.capture_mode = mode;
    }

    // --- Capture ---

    /// Fires whichever capture the current mode selects.
    pub async fn shutter(&self) {
        let mode = self.preferences.lock().await.capture_mode;
        match mode {
            CaptureMode::Photo => self.capture_photo().await,
            CaptureMode::Video => self.start_video().await,
        }
    }

    pub async fn capture_photo(&self) {
        self.transition(|state| state.capture_photo()).await;
    }

    pub async fn start_video(&self) {
        self.transition(|state| state.begin_video()).await;
    }

    pub async fn reload_film(&self) {
        self.transition(|state| state.reload()).await;
    }

    pub async fn set_captions_enabled(&self, enabled: bool) {
        self.state.lock().await.set_captions_enabled(enabled);
    }

    // --- Board ---

    pub async fn pointer_down(&self, x: f64, y: f64) -> bool {
        let grabbed = self.state.lock().await.pointer_down(x, y);
        if grabbed {
            self.emit(EngineEvent::StateChanged);
        }
        grabbed
    }

    pub async fn pointer_move(&self, x: f64, y: f64) {
        self.transition(move |state| state.pointer_move(x, y, Instant::now()))
            .await;
    }

    pub async fn pointer_up(&self, x: f64, y: f64) {
        self.transition(move |state| state.pointer_up(x, y)).await;
    }

    pub async fn keep(&self, id: &str, x: f64, y: f64) {
        self.transition(|state| state.keep(id, x, y)).await;
    }

    pub async fn bring_to_front(&self, id: &str) -> Option<i64> {
        let stack_order = self.state.lock().await.bring_to_front(id);
        if stack_order.is_some() {
            self.emit(EngineEvent::StateChanged);
        }
        stack_order
    }

    pub async fn set_caption(&self, id: &str, caption: &str) -> bool {
        let changed = self.state.lock().await.set_caption(id, caption);
        if changed {
            self.emit(EngineEvent::StateChanged);
        }
        changed
    }

    pub async fn set_annotation(&self, id: &str, text: &str) -> bool {
        let changed = self.state.lock().await.set_annotation(id, text);
        if changed {
            self.emit(EngineEvent::StateChanged);
        }
        changed
    }

    pub async fn clear_cards(&self) {
        self.state.lock().await.clear_cards();
        self.emit(EngineEvent::StateChanged);
    }

    pub async fn set_viewport(&self, width: f64, height: f64) {
        self.state.lock().await.set_viewport(width, height);
    }

    // --- Room ---

    pub async fn set_room_key(&self, raw: &str) {
        self.transition(|state| state.set_room_key(raw)).await;
    }

    pub async fn sign_in(&self, identity: Identity) {
        self.transition(move |state| state.sign_in(identity)).await;
    }

    pub async fn sign_out(&self) {
        self.transition(|state| state.sign_out()).await;
    }

    /// Stops every worker, leaves the room and releases the camera.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.cancel();

        let workers: Vec<_> = self.workers.lock().await.drain(..).collect();
        for worker in workers {
            if let Err(err) = worker.await {
                log_error!("engine worker failed to join: {}", err);
            }
        }

        self.power_off().await;
        self.subscription.lock().await.stop().await
    }

    // --- Internals ---

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn transition<F>(&self, change: F)
    where
        F: FnOnce(&mut AppState) -> Vec<Effect>,
    {
        let effects = {
            let mut state = self.state.lock().await;
            change(&mut state)
        };
        self.dispatch(effects);
        self.emit(EngineEvent::StateChanged);
    }

    /// Runs effects without holding the state lock. Anything slow gets its own task.
    fn dispatch(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Schedule { after, timer } => {
                    let this = self.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = time::sleep(after) => {
                                this.transition(move |state| state.on_timer(timer)).await;
                            }
                            _ = this.shutdown.cancelled() => {}
                        }
                    });
                }
                Effect::RequestCaption { id, payload } => {
                    self.spawn_caption(id, payload);
                }
                Effect::RecordVideo { duration } => {
                    let this = self.clone();
                    tokio::spawn(async move {
                        let clip = match &this.collaborators.recorder {
                            Some(recorder) => recorder.record(duration).await,
                            None => Err(anyhow!("no video recorder attached")),
                        };
                        this.transition(move |state| state.finish_video(clip)).await;
                    });
                }
                Effect::InsertRemote { identity, row } => {
                    let this = self.clone();
                    tokio::spawn(async move {
                        let id = row.id.clone();
                        match this.collaborators.store.insert_card(&identity, row).await {
                            Ok(_) => log::debug!("card {id} shared"),
                            Err(err) => {
                                log_error!("sharing card {} failed: {}", id, err);
                                this.transition(|state| state.remote_insert_failed(&err))
                                    .await;
                            }
                        }
                    });
                }
                Effect::Broadcast { room_id, message } => {
                    let store = self.collaborators.store.clone();
                    tokio::spawn(async move {
                        if let Err(err) = store.broadcast(&room_id, message).await {
                            log::debug!("broadcast to room {room_id} dropped: {err}");
                        }
                    });
                }
                Effect::SyncRoom => {
                    let this = self.clone();
                    tokio::spawn(async move { this.sync_room().await });
                }
                Effect::Notify(notice) => self.emit(EngineEvent::Notice(notice)),
                Effect::Flash { user_id } => self.emit(EngineEvent::Flash { user_id }),
            }
        }
    }

    fn spawn_caption(&self, id: CaptureId, payload: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let caption =
                caption_or_fallback(this.collaborators.captioner.as_deref(), &payload).await;
            this.transition(|state| {
                state.caption_ready(&id, &caption);
                Vec::new()
            })
            .await;
        });
    }

    /// Points the subscription at whatever room the session wants now.
    ///
    /// Concurrent calls serialize on the subscription lock; each one reads the
    /// session fresh, so the last switch always wins.
    async fn sync_room(&self) {
        let mut subscription = self.subscription.lock().await;
        let desired = self.state.lock().await.desired_room();

        match &desired {
            Some((_, epoch)) if subscription.epoch() == Some(*epoch) => return,
            None if !subscription.is_active() => return,
            _ => {}
        }

        if let Err(err) = subscription.stop().await {
            log_warn!("stopping room subscription failed: {}", err);
        }

        if let Some((room_id, epoch)) = desired {
            log_info!("joining room {} (epoch {})", room_id, epoch);
            if let Err(err) = subscription.start(
                self.collaborators.store.clone(),
                room_id,
                epoch,
                self.deliveries.clone(),
            ) {
                log_error!("starting room subscription failed: {}", err);
            }
        }
    }

    async fn pump_deliveries(self, mut rx: mpsc::UnboundedReceiver<RoomDelivery>) {
        loop {
            tokio::select! {
                delivery = rx.recv() => match delivery {
                    Some(delivery) => {
                        self.transition(move |state| state.apply_delivery(delivery, Instant::now()))
                            .await;
                    }
                    None => break,
                },
                _ = self.shutdown.cancelled() => break,
            }
        }
    }

    async fn sweep_presence(self) {
        let mut ticker = time::interval(self.sweep_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.state.lock().await.sweep_presence(Instant::now());
                    if removed > 0 {
                        log::debug!("presence sweep dropped {removed} cursors");
                        self.emit(EngineEvent::StateChanged);
                    }
                }
                _ = self.shutdown.cancelled() => break,
            }
        }
    }
}
