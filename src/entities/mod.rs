pub mod prelude;

pub mod voter;
