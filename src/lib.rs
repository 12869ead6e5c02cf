//! Trend Press - trending topics to blog articles
//!
//! This crate ingests a trends RSS feed into a SQLite store, drafts articles
//! from stored trends through a generative-AI service, and serves a public
//! blog plus a token-gated admin API.

pub mod config;
pub mod db;
pub mod feed;
pub mod fetcher;
pub mod generator;
pub mod ingest;
pub mod routes;
pub mod slug;
