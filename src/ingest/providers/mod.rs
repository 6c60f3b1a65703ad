// src/ingest/providers/mod.rs
pub mod department_rss;
pub mod news_search;
pub mod reddit;
