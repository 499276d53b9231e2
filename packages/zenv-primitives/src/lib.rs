mod descriptor;
mod input;
mod system;

pub mod testing;

pub use descriptor::*;
pub use input::*;
pub use system::*;
