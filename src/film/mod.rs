pub mod state;

pub use state::{FilmGovernor, FilmState};
