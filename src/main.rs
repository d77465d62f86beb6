//! Two headless clients sharing one room: alice shoots and keeps a print,
//! bob watches it arrive and develop. Pass a path (or set `RETROCAM_DB`) to
//! keep the room on disk; otherwise the store lives in memory.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use log::info;
use retrocam_lib::{
    capture::{CameraDevice, Facing, FrameSource},
    engine::{AppSnapshot, CameraController, Collaborators, EngineConfig, EngineEvent},
    init_logging,
    models::{Identity, LifecycleState},
    SettingsStore, SqliteRoomStore,
};

/// Diagonal gradient in one tint, standing in for a webcam.
struct TestPattern {
    tint: [u8; 3],
}

impl FrameSource for TestPattern {
    fn current_frame(&self) -> Option<DynamicImage> {
        let image = RgbImage::from_fn(320, 240, |x, y| {
            let shade = ((x + y) % 256) as u16;
            let [r, g, b] = self.tint;
            Rgb([
                (r as u16 * shade / 255) as u8,
                (g as u16 * shade / 255) as u8,
                (b as u16 * shade / 255) as u8,
            ])
        });
        Some(DynamicImage::ImageRgb8(image))
    }

    fn release(&self) {
        info!("test pattern released");
    }
}

struct TestPatternCamera {
    tint: [u8; 3],
}

#[async_trait]
impl CameraDevice for TestPatternCamera {
    async fn acquire(&self, facing: Facing, resolution: (u32, u32)) -> Result<Arc<dyn FrameSource>> {
        info!("opening {:?} camera at {}x{}", facing, resolution.0, resolution.1);
        Ok(Arc::new(TestPattern { tint: self.tint }))
    }
}

async fn wait_for<F>(controller: &CameraController, what: &str, check: F) -> Result<AppSnapshot>
where
    F: Fn(&AppSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            let snapshot = controller.snapshot().await;
            if check(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .map_err(|_| anyhow!("timed out waiting for {what}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = EngineConfig::from_env();
    let settings_path = std::env::temp_dir()
        .join("retrocam-demo")
        .join("settings.json");
    let settings = SettingsStore::new(settings_path)?.user_settings()?;
    let db_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("RETROCAM_DB"))
        .map(PathBuf::from);
    let store = Arc::new(match db_path {
        Some(path) => SqliteRoomStore::open(path)?,
        None => SqliteRoomStore::in_memory()?,
    });

    let client = |tint: [u8; 3]| {
        CameraController::new(
            config.clone(),
            settings.clone(),
            Collaborators {
                store: store.clone(),
                device: Arc::new(TestPatternCamera { tint }),
                recorder: None,
                captioner: None,
            },
        )
    };
    let alice = client([255, 180, 90]).await;
    let bob = client([90, 180, 255]).await;

    let mut bob_events = bob.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = bob_events.recv().await {
            if let EngineEvent::Flash { user_id } = event {
                info!("bob saw a flash from {user_id}");
            }
        }
    });

    alice.sign_in(Identity::new("alice")).await;
    bob.sign_in(Identity::new("bob")).await;

    if !alice.power_on().await {
        return Err(anyhow!("alice's camera could not be opened"));
    }
    alice.shutter().await;

    let snapshot = wait_for(&alice, "the print to eject", |s| {
        s.pending
            .as_ref()
            .is_some_and(|c| c.lifecycle_state == LifecycleState::AwaitingPlacement)
    })
    .await?;
    let print = snapshot
        .pending
        .ok_or_else(|| anyhow!("pending print vanished"))?;
    info!(
        "alice holds {} ({} shots left, caption {:?})",
        print.id, snapshot.film_remaining, print.caption
    );

    alice.keep(&print.id, 320.0, 240.0).await;

    let seen = wait_for(&bob, "bob to see the print settle", |s| {
        s.cards
            .iter()
            .any(|c| c.id == print.id && c.lifecycle_state == LifecycleState::Settled)
    })
    .await?;
    let copies = seen.cards.iter().filter(|c| c.id == print.id).count();
    info!(
        "bob's board in room '{}' has {} card(s), {} copy of alice's print",
        seen.room_key,
        seen.cards.len(),
        copies
    );

    alice.shutdown().await?;
    bob.shutdown().await?;
    Ok(())
}
