pub mod feed;
pub mod persistence;
pub mod queue;
pub mod web;
