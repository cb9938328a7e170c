mod counter;
mod settings;

pub use counter::Counter;
pub use journal::Journal;
pub use settings::Settings;
