pub mod cli;
pub mod net;
pub mod state;
pub mod validation;
