pub mod credentials;
pub mod gate;
pub mod session;
pub mod tokens;
pub mod users;
