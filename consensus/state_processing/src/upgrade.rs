pub mod altair;

pub use altair::upgrade_to_altair;
