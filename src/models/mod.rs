pub mod case;
pub mod enums;
pub mod history;

pub use case::*;
pub use enums::*;
pub use history::*;
