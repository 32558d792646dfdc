#[macro_use]
extern crate serde;

mod ballot;
mod channel;
mod config;
mod credential;
mod election;
mod eligibility;
mod error;
mod messages;
mod method;
mod params;
mod secrets;
mod util;

pub mod vdf;

pub use ballot::*;
pub use channel::*;
pub use config::*;
pub use credential::*;
pub use election::*;
pub use eligibility::*;
pub use error::*;
pub use messages::*;
pub use method::*;
pub use params::*;
pub use secrets::*;
pub use util::*;
