pub mod span;
pub mod tag;
pub mod token;
pub mod window;

pub use span::*;
pub use tag::*;
pub use token::*;
pub use window::*;
