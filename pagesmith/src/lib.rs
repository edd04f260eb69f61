//! pagesmith: build requests in, GitHub Pages sites out.
//!
//! A request is acknowledged immediately and then handled by a detached
//! pipeline:
//! - generate: an LLM writes `index.html`; README, LICENSE and attachments join it
//! - publish: a new repository gets every file, one commit per file
//! - host: GitHub Pages is switched on and given time to deploy
//! - notify: the caller's evaluation URL receives a completion notice, with retries

pub mod config;
pub mod error;
pub mod fakes;
pub mod generator;
pub mod hosting;
pub mod llm;
pub mod model;
pub mod notifier;
pub mod pipeline;
pub mod publisher;
pub mod scaffold;
pub mod web;
