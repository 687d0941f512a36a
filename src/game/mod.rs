pub mod hp;
pub mod state;

pub use hp::HpMapping;
pub use state::{GameMachine, GameState, GameStatus, SessionStats, Transition};
