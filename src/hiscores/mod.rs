pub mod client;
pub mod parser;
pub mod provider;

pub use client::HiscoresClient;
pub use parser::{skill_name, SKILLS};
pub use provider::HiscoresSource;
