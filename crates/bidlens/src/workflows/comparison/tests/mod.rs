mod analytics;
mod common;
mod scoring;
mod session;
mod table;
