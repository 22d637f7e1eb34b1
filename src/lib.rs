pub mod blend;
pub mod calibration;
pub mod dataset;
pub mod error;
pub mod features;
pub mod ledger;
pub mod monte_carlo;
pub mod params;
pub mod projection;
pub mod rating_store;
pub mod walk_forward;
