//! Provider-agnostic headless CMS gateway.
//!
//! Adapters for Sanity, Strapi and Contentful map native documents onto
//! one canonical content model. Every read goes through a per-provider
//! tagged cache that webhooks and manual triggers invalidate.

pub mod application;
pub mod cache;
pub mod client;
pub mod config;
pub mod domain;
pub mod infra;
pub mod providers;
pub mod registry;
pub mod revalidation;
