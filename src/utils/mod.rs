pub mod logging;
pub mod tokens;
