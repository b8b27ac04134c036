pub mod artifacts;
pub mod booster;
pub mod commands;
pub mod config;
pub mod elasticity;
pub mod encoders;
pub mod errors;
pub mod features;
pub mod forecaster;
pub mod models;
pub mod predictor;
pub mod quantity;
pub mod reference;
pub mod scenario;
