//! Change Notification
//!
//! Turns "provisioning data changed" signals into one snapshot rebuild
//! and one round of refresh pushes per burst of edits.

mod clock;
mod poker;
mod timers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use poker::{
    ChangeNotifier, NotifierConfig, PokeCycle, DEFAULT_HARD_DELAY, DEFAULT_SOFT_DELAY,
    NODES_PARAMETER,
};
pub use timers::PokeTimers;
