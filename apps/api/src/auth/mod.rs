// Authentication: credentials, session tokens, cookie transport, password reset.

pub mod handlers;
pub mod otp;
pub mod password;
pub mod session;
pub mod token;
