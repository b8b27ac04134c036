pub mod forecast;
pub mod inspect;
pub mod optimize;
pub mod predict;
pub mod simulate;
