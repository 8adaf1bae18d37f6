mod exchange;
mod impls;
mod requests;
mod responses;
mod util;

pub use self::exchange::*;
pub use impls::*;
pub use requests::*;
pub use responses::*;
pub use util::*;
