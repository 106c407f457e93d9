#![allow(unused_imports)]

pub use super::voter::Entity as Voter;
