use std::time::Duration;

/// Fixed timings and sizes of the camera experience.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shots per roll of film
    pub film_capacity: u32,

    /// Print "developing" in the slot before it can be dragged
    pub eject_duration: Duration,
    /// Local settle animation after Keep or a remote arrival
    pub develop_duration: Duration,
    pub reload_duration: Duration,
    pub video_duration: Duration,

    /// Presence bookkeeping
    pub presence_sweep_interval: Duration,
    pub presence_stale_after: Duration,
    pub cursor_throttle: Duration,

    /// How long the empty-room-key warning stays up
    pub warning_duration: Duration,

    pub jpeg_quality: u8,
    pub capture_resolution: (u32, u32),

    /// Card size and where a fresh print appears, in viewport pixels
    pub card_size: (f64, f64),
    pub eject_origin: (f64, f64),
    /// Fresh prints get a random tilt in [-spread, spread] degrees
    pub rotation_spread: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            film_capacity: 8,
            eject_duration: Duration::from_millis(2500),
            develop_duration: Duration::from_millis(1500),
            reload_duration: Duration::from_millis(2000),
            video_duration: Duration::from_secs(3),
            presence_sweep_interval: Duration::from_secs(1),
            presence_stale_after: Duration::from_secs(2),
            cursor_throttle: Duration::from_millis(50),
            warning_duration: Duration::from_secs(3),
            jpeg_quality: 90,
            capture_resolution: (1280, 720),
            card_size: (220.0, 260.0),
            eject_origin: (40.0, 420.0),
            rotation_spread: 8.0,
        }
    }
}

impl EngineConfig {
    /// Defaults, with every delay cut down when `RETROCAM_DEBUG` is set.
    pub fn from_env() -> Self {
        let debug_mode = std::env::var("RETROCAM_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug_mode {
            Self::fast()
        } else {
            Self::default()
        }
    }

    /// Same behavior with millisecond-scale delays.
    pub fn fast() -> Self {
        Self {
            eject_duration: Duration::from_millis(30),
            develop_duration: Duration::from_millis(30),
            reload_duration: Duration::from_millis(30),
            video_duration: Duration::from_millis(30),
            presence_sweep_interval: Duration::from_millis(20),
            presence_stale_after: Duration::from_millis(60),
            cursor_throttle: Duration::from_millis(5),
            warning_duration: Duration::from_millis(40),
            ..Self::default()
        }
    }
}
