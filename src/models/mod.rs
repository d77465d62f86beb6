pub mod capture;
pub mod card;
pub mod presence;

pub use capture::{Capture, CaptureId, LifecycleState, MediaKind, Placement};
pub use card::{CardRow, CoordinateSpace, Identity, NewCardRow, Viewport};
pub use presence::PresenceCursor;
