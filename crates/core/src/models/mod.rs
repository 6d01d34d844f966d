//! Data models for BiteVibes

mod history;
mod item;
mod meal;
mod preset;
mod room;

pub use history::*;
pub use item::*;
pub use meal::*;
pub use preset::*;
pub use room::*;
