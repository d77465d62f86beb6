use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use rand::Rng;
use serde::Serialize;

use crate::{
    capture::{CapturePipeline, DeviceState, FrameSource},
    cards::CardStore,
    film::FilmGovernor,
    models::{
        Capture, CardRow, Identity, LifecycleState, MediaKind, NewCardRow, Placement,
        PresenceCursor, Viewport,
    },
    pending::{DragState, DragTarget, PendingSlot},
    presence::PresenceLayer,
    room::{validate_room_key, RoomDelivery, RoomError, RoomMessage, RoomSession},
};

use super::{
    config::EngineConfig,
    effects::{Effect, Notice, NoticeKind, Timer},
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Serializable view of everything the UI renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    pub device: &'static str,
    pub film_remaining: u32,
    pub film_reloading: bool,
    pub recording: bool,
    pub pending: Option<Capture>,
    pub cards: Vec<Capture>,
    pub cursors: Vec<PresenceCursor>,
    pub room_key: String,
    pub signed_in_as: Option<String>,
    pub warning: Option<Notice>,
}

/// The whole engine state. Each component owns its own field; transitions
/// return the effects the runtime has to carry out.
pub struct AppState {
    config: EngineConfig,
    pipeline: CapturePipeline,
    device: DeviceState,
    film: FilmGovernor,
    pending: PendingSlot,
    cards: CardStore,
    presence: PresenceLayer,
    session: RoomSession,
    viewport: Viewport,
    drag: Option<DragState>,
    recording: bool,
    captions_enabled: bool,
    warning: Option<Notice>,
    warning_epoch: u64,
}

impl AppState {
    pub fn new(config: EngineConfig, room_key: &str) -> Self {
        Self {
            pipeline: CapturePipeline::new(config.jpeg_quality),
            device: DeviceState::Off,
            film: FilmGovernor::new(config.film_capacity),
            pending: PendingSlot::Idle,
            cards: CardStore::new(),
            presence: PresenceLayer::new(config.cursor_throttle, config.presence_stale_after),
            session: RoomSession::new(room_key.trim()),
            viewport: Viewport::default(),
            drag: None,
            recording: false,
            captions_enabled: true,
            warning: None,
            warning_epoch: 0,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn film(&self) -> &FilmGovernor {
        &self.film
    }

    pub fn pending(&self) -> &PendingSlot {
        &self.pending
    }

    pub fn cards(&self) -> &CardStore {
        &self.cards
    }

    pub fn presence(&self) -> &PresenceLayer {
        &self.presence
    }

    pub fn session(&self) -> &RoomSession {
        &self.session
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn warning(&self) -> Option<&Notice> {
        self.warning.as_ref()
    }

    pub fn set_captions_enabled(&mut self, enabled: bool) {
        self.captions_enabled = enabled;
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = Viewport::new(width, height);
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            device: self.device.label(),
            film_remaining: self.film.remaining(),
            film_reloading: self.film.is_reloading(),
            recording: self.recording,
            pending: self.pending.capture().cloned(),
            cards: self.cards.sorted().into_iter().cloned().collect(),
            cursors: self.presence.cursors(),
            room_key: self.session.room_key().to_string(),
            signed_in_as: self.session.identity().map(|identity| identity.user_id.clone()),
            warning: self.warning.clone(),
        }
    }

    // --- Device ---

    /// Off/Denied -> Acquiring. Returns false when a stream is already live or pending.
    pub fn begin_power_on(&mut self) -> bool {
        match self.device {
            DeviceState::Off | DeviceState::Denied => {
                self.device = DeviceState::Acquiring;
                true
            }
            DeviceState::Acquiring | DeviceState::On(_) => false,
        }
    }

    /// Finishes acquisition. A stream arriving after power-off is handed back for release.
    pub fn device_acquired(
        &mut self,
        result: Result<Arc<dyn FrameSource>>,
    ) -> (Vec<Effect>, Option<Arc<dyn FrameSource>>) {
        if !matches!(self.device, DeviceState::Acquiring) {
            return (Vec::new(), result.ok());
        }
        match result {
            Ok(source) => {
                self.device = DeviceState::On(source);
                (Vec::new(), None)
            }
            Err(err) => {
                log_warn!("camera access denied: {err:#}");
                self.device = DeviceState::Denied;
                let notice = Notice::new(NoticeKind::CameraDenied, "Camera access was denied");
                (vec![Effect::Notify(notice)], None)
            }
        }
    }

    /// Returns the stream the caller must release.
    pub fn power_off(&mut self) -> Option<Arc<dyn FrameSource>> {
        match std::mem::take(&mut self.device) {
            DeviceState::On(source) => Some(source),
            _ => None,
        }
    }

    // --- Capture ---

    fn room_key_blocks_capture(&mut self) -> Option<Vec<Effect>> {
        if !self.session.is_authenticated() {
            return None;
        }
        let Err(err) = validate_room_key(self.session.room_key()) else {
            return None;
        };

        self.warning_epoch += 1;
        let notice = Notice::new(NoticeKind::RoomKeyRequired, err.to_string());
        self.warning = Some(notice.clone());
        Some(vec![
            Effect::Notify(notice),
            Effect::Schedule {
                after: self.config.warning_duration,
                timer: Timer::WarningExpired(self.warning_epoch),
            },
        ])
    }

    fn capture_blocked(&self) -> Option<&'static str> {
        if !self.device.is_on() {
            Some("camera is off")
        } else if self.pending.is_occupied() {
            Some("pending slot occupied")
        } else if self.recording {
            Some("recording in progress")
        } else {
            None
        }
    }

    fn fresh_placement(&mut self) -> Placement {
        let spread = self.config.rotation_spread.abs();
        let rotation_degrees = if spread > 0.0 {
            rand::thread_rng().gen_range(-spread..=spread)
        } else {
            0.0
        };
        Placement {
            x: self.config.eject_origin.0,
            y: self.config.eject_origin.1,
            rotation_degrees,
            stack_order: self.cards.next_stack_order(),
        }
    }

    fn flash_effect(&self) -> Option<Effect> {
        let room_id = self.session.active_room()?;
        let identity = self.session.identity()?;
        Some(Effect::Broadcast {
            room_id,
            message: RoomMessage::Flash {
                user_id: identity.user_id.clone(),
            },
        })
    }

    fn eject(&mut self, capture: Capture) -> Vec<Effect> {
        let id = capture.id.clone();
        let kind = capture.media_kind;
        if let Err(rejected) = self.pending.begin_eject(capture) {
            log_warn!("dropping capture {}: pending slot occupied", rejected.id);
            return Vec::new();
        }
        log::debug!("ejecting {} {id}", kind.as_str());
        vec![Effect::Schedule {
            after: self.config.eject_duration,
            timer: Timer::EjectElapsed(id),
        }]
    }

    /// Photo shutter. Anything that would block capture makes this a no-op.
    pub fn capture_photo(&mut self) -> Vec<Effect> {
        if let Some(reason) = self.capture_blocked() {
            log::debug!("photo capture rejected: {reason}");
            return Vec::new();
        }
        if !self.film.can_shoot() {
            log::debug!("photo capture rejected: film empty or reloading");
            return Vec::new();
        }
        if let Some(effects) = self.room_key_blocks_capture() {
            return effects;
        }

        let frame = self.device.source().and_then(|source| source.current_frame());
        let payload = match self.pipeline.photo_payload(frame) {
            Ok(payload) => payload,
            Err(err) => {
                log::debug!("photo capture rejected: {err:#}");
                return Vec::new();
            }
        };

        self.film.try_consume();
        let placement = self.fresh_placement();
        let capture = Capture::new(payload, MediaKind::Photo, placement);
        log_info!(
            "captured {} ({} shots left)",
            capture.id,
            self.film.remaining()
        );

        let caption_request = self.captions_enabled.then(|| Effect::RequestCaption {
            id: capture.id.clone(),
            payload: capture.media_payload.clone(),
        });

        let mut effects = self.eject(capture);
        effects.extend(caption_request);
        effects.extend(self.flash_effect());
        effects
    }

    /// Starts a fixed-length clip. Exclusive with every other capture.
    pub fn begin_video(&mut self) -> Vec<Effect> {
        if let Some(reason) = self.capture_blocked() {
            log::debug!("video capture rejected: {reason}");
            return Vec::new();
        }
        // Video leaves the counter alone but still needs film in the camera.
        if !self.film.can_shoot() {
            log::debug!("video capture rejected: film empty or reloading");
            return Vec::new();
        }
        if let Some(effects) = self.room_key_blocks_capture() {
            return effects;
        }

        self.recording = true;
        let mut effects = vec![Effect::RecordVideo {
            duration: self.config.video_duration,
        }];
        effects.extend(self.flash_effect());
        effects
    }

    pub fn finish_video(&mut self, clip: Result<Vec<u8>>) -> Vec<Effect> {
        if !self.recording {
            return Vec::new();
        }
        self.recording = false;

        let payload = match clip.and_then(|bytes| self.pipeline.video_payload(&bytes)) {
            Ok(payload) => payload,
            Err(err) => {
                log_warn!("recording failed: {err:#}");
                return Vec::new();
            }
        };

        let placement = self.fresh_placement();
        let capture = Capture::new(payload, MediaKind::Video, placement);
        log_info!("recorded {}", capture.id);
        self.eject(capture)
    }

    // --- Timers ---

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        match timer {
            Timer::EjectElapsed(id) => {
                if !self.pending.finish_eject(&id) {
                    log::debug!("eject timer for {id} no longer applies");
                }
            }
            Timer::DevelopElapsed(id) => {
                self.cards.mark_settled(&id);
            }
            Timer::ReloadElapsed(epoch) => {
                if self.film.finish_reload(epoch) {
                    log_info!("film reloaded ({} shots)", self.film.remaining());
                }
            }
            Timer::WarningExpired(epoch) => {
                if epoch == self.warning_epoch {
                    self.warning = None;
                }
            }
        }
        Vec::new()
    }

    pub fn reload(&mut self) -> Vec<Effect> {
        match self.film.begin_reload() {
            Some(epoch) => vec![Effect::Schedule {
                after: self.config.reload_duration,
                timer: Timer::ReloadElapsed(epoch),
            }],
            None => Vec::new(),
        }
    }

    // --- Pointer gestures ---

    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        let (width, height) = self.config.card_size;

        if let Some(capture) = self.pending.capture() {
            let id = capture.id.clone();
            let origin = (capture.placement.x, capture.placement.y);
            if self.pending.is_awaiting(&id) && capture.contains(x, y, width, height) {
                let stack_order = self.cards.next_stack_order();
                self.pending.set_stack_order(&id, stack_order);
                self.drag = Some(DragState::new(DragTarget::Pending(id), (x, y), origin));
                return true;
            }
        }

        let Some(id) = self.cards.hit_test(x, y, width, height) else {
            return false;
        };
        let Some(card) = self.cards.get(&id) else {
            return false;
        };
        let origin = (card.placement.x, card.placement.y);
        self.cards.bring_to_front(&id);
        self.drag = Some(DragState::new(DragTarget::Card(id), (x, y), origin));
        true
    }

    /// Drags whatever is held and, in a live room, offers a throttled cursor broadcast.
    pub fn pointer_move(&mut self, x: f64, y: f64, now: Instant) -> Vec<Effect> {
        if let Some(drag) = self.drag.as_mut() {
            let (ox, oy) = drag.origin_for(x, y);
            drag.moved = true;
            match &drag.target {
                DragTarget::Pending(id) => {
                    self.pending.move_to(id, ox, oy);
                }
                DragTarget::Card(id) => {
                    self.cards.move_to(id, ox, oy);
                }
            }
        }

        let Some(room_id) = self.session.active_room() else {
            return Vec::new();
        };
        let Some(identity) = self.session.identity() else {
            return Vec::new();
        };
        match self
            .presence
            .local_move(&identity.user_id, x, y, &self.viewport, now)
        {
            Some(cursor) => vec![Effect::Broadcast {
                room_id,
                message: RoomMessage::Cursor(cursor),
            }],
            None => Vec::new(),
        }
    }

    /// Ends the gesture. Releasing a dragged pending card keeps it.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Vec<Effect> {
        let Some(drag) = self.drag.take() else {
            return Vec::new();
        };
        match drag.target {
            DragTarget::Pending(ref id) if drag.moved => {
                let (ox, oy) = drag.origin_for(x, y);
                self.keep(id, ox, oy)
            }
            _ => Vec::new(),
        }
    }

    /// Commits the pending capture at the destination.
    ///
    /// Signed into a room, the card goes to the remote store and only comes
    /// back through the change feed. Otherwise it lands in the local store.
    /// Either way the slot is free as soon as this returns.
    pub fn keep(&mut self, id: &str, x: f64, y: f64) -> Vec<Effect> {
        let Some(mut capture) = self.pending.take_for_keep(id, x, y) else {
            return Vec::new();
        };
        capture.placement.stack_order = self.cards.next_stack_order();

        if let (Some(room_id), Some(identity)) =
            (self.session.active_room(), self.session.identity().cloned())
        {
            log_info!("sharing {} to room {}", capture.id, room_id);
            let row = NewCardRow::from_capture(&capture, &room_id, &self.viewport);
            return vec![Effect::InsertRemote { identity, row }];
        }

        let id = capture.id.clone();
        self.cards.insert(capture);
        vec![Effect::Schedule {
            after: self.config.develop_duration,
            timer: Timer::DevelopElapsed(id),
        }]
    }

    pub fn remote_insert_failed(&mut self, err: &RoomError) -> Vec<Effect> {
        vec![Effect::Notify(Notice::new(
            NoticeKind::ShareFailed,
            format!("Couldn't share that card: {err}"),
        ))]
    }

    // --- Card store messages ---

    pub fn bring_to_front(&mut self, id: &str) -> Option<i64> {
        self.cards.bring_to_front(id)
    }

    pub fn clear_cards(&mut self) {
        self.cards.clear();
        if matches!(self.drag, Some(DragState { target: DragTarget::Card(_), .. })) {
            self.drag = None;
        }
    }

    /// Asynchronous caption result. Applied wherever the capture is now; late
    /// results for shared or discarded captures are dropped.
    pub fn caption_ready(&mut self, id: &str, caption: &str) -> bool {
        if self.pending.update_caption(id, caption) || self.cards.update_caption(id, caption) {
            return true;
        }
        log::debug!("caption for {id} arrived after the capture left this client");
        false
    }

    /// Free-text override from the user.
    pub fn set_caption(&mut self, id: &str, caption: &str) -> bool {
        self.pending.set_caption(id, caption) || self.cards.set_caption(id, caption)
    }

    pub fn set_annotation(&mut self, id: &str, text: &str) -> bool {
        self.cards.set_annotation(id, text)
    }

    // --- Room ---

    fn rebind(&mut self) -> Vec<Effect> {
        self.cards.clear();
        self.presence.clear();
        if matches!(self.drag, Some(DragState { target: DragTarget::Card(_), .. })) {
            self.drag = None;
        }
        vec![Effect::SyncRoom]
    }

    pub fn set_room_key(&mut self, raw: &str) -> Vec<Effect> {
        match self.session.set_room_key(raw) {
            Some(epoch) => {
                log_info!("room key set to '{}' (epoch {})", self.session.room_key(), epoch);
                self.rebind()
            }
            None => Vec::new(),
        }
    }

    pub fn sign_in(&mut self, identity: Identity) -> Vec<Effect> {
        match self.session.sign_in(identity) {
            Some(_) => self.rebind(),
            None => Vec::new(),
        }
    }

    pub fn sign_out(&mut self) -> Vec<Effect> {
        match self.session.sign_out() {
            Some(_) => self.rebind(),
            None => Vec::new(),
        }
    }

    /// Room and epoch the subscription should currently serve.
    pub fn desired_room(&self) -> Option<(String, u64)> {
        self.session
            .active_room()
            .map(|room| (room, self.session.epoch()))
    }

    fn remote_capture(&self, row: CardRow, state: LifecycleState) -> Capture {
        if row.coord_space.is_none() {
            log_warn!("card {} has no coordinate tag, inferring from range", row.id);
        }
        row.into_capture(&self.viewport, state)
    }

    pub fn apply_delivery(&mut self, delivery: RoomDelivery, now: Instant) -> Vec<Effect> {
        match delivery {
            RoomDelivery::Fetched { epoch, rows } => {
                if !self.session.is_current(epoch) {
                    log::debug!("ignoring fetch from stale epoch {epoch}");
                    return Vec::new();
                }
                let captures = rows
                    .into_iter()
                    .map(|row| self.remote_capture(row, LifecycleState::Settled))
                    .collect();
                let added = self.cards.seed(captures);
                log_info!("seeded {} cards from room {}", added, self.session.room_key());
                Vec::new()
            }
            RoomDelivery::Message { epoch, message } => {
                if !self.session.is_current(epoch) {
                    log::debug!("ignoring room message from stale epoch {epoch}");
                    return Vec::new();
                }
                self.apply_room_message(message, now)
            }
        }
    }

    fn apply_room_message(&mut self, message: RoomMessage, now: Instant) -> Vec<Effect> {
        let self_id = self.session.identity().map(|identity| identity.user_id.clone());
        match message {
            RoomMessage::Inserted(row) => {
                if self.cards.contains(&row.id) {
                    return Vec::new();
                }
                let capture = self.remote_capture(row, LifecycleState::Developing);
                let id = capture.id.clone();
                self.cards.observe_stack_order(capture.placement.stack_order);
                self.cards.insert(capture);
                vec![Effect::Schedule {
                    after: self.config.develop_duration,
                    timer: Timer::DevelopElapsed(id),
                }]
            }
            RoomMessage::Flash { user_id } => {
                if self_id.as_deref() == Some(user_id.as_str()) {
                    Vec::new()
                } else {
                    vec![Effect::Flash { user_id }]
                }
            }
            RoomMessage::Cursor(cursor) => {
                self.presence.apply_remote(self_id.as_deref(), cursor, now);
                Vec::new()
            }
        }
    }

    pub fn sweep_presence(&mut self, now: Instant) -> usize {
        self.presence.sweep(now)
    }
}
