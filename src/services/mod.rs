pub mod forecast;
pub mod owm;
pub mod validation;
