//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - Crédit Mutuel website scraper for the BankAdapter port
//! - Local file (or inline) server secret for the SecretStore port
//! - A serializable cookie jar shared by scraping adapters

pub mod cookie_jar;
pub mod credit_mutuel;
pub mod credit_mutuel_pages;
pub mod secret_file;

#[cfg(test)]
pub mod credit_mutuel_mock;
