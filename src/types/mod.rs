pub mod ids;
pub mod params;
pub mod response;

pub use ids::*;
pub use params::{ParamValue, Params};
pub use response::{Envelope, PayResponse};
