pub mod browser;
pub mod linear_provider;
pub mod oauth;
