pub mod password;
pub mod session;

pub use password::PasswordService;
pub use session::AuthService;
