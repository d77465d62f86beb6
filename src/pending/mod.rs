pub mod drag;
pub mod state;

pub use drag::{DragState, DragTarget};
pub use state::PendingSlot;
