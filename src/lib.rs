//! Quillnote - A blogging platform with engagement tracking
//!
//! This library provides the post lifecycle, the likes/ratings/comments
//! ledger, author and category subscriptions, and the notification inbox.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
