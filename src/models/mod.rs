mod app;
mod checkout;
mod download_token;
mod user;

pub use app::*;
pub use checkout::*;
pub use download_token::*;
pub use user::*;
