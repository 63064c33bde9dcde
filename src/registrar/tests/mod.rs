mod common;

mod conflicts;
mod service;
mod waitlist;
