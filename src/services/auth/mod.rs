pub mod factory;
pub mod session_token;

pub use factory::build_token_validator;
pub use session_token::TokenValidator;
