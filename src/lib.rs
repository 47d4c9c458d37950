//! Ballot Assistant
//!
//! A conversational assistant for an awards-prediction ballot. The chat
//! endpoint drives a tool-calling model through server-side data tools and
//! hands ballot edits and navigation back to the client.

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod llm;
pub mod store;
pub mod system_prompt;
pub mod tools;
pub mod turn;

#[cfg(test)]
mod testing;
