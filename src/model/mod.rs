//! Data types, split by where they come from or go to.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
