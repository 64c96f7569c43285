#![doc = "dataset-loader-core: discovery and reconciliation library for dataset-loader."]

//! This crate contains the source discovery providers, the reconciliation engine and
//! the transport plumbing used to publish datasets into a Dataverse-style repository.
//! The concrete repository client lives in the CLI crate.
//!
//! # Usage
//! Pick a provider with [`select::select`], then hand it to [`synchronise::synchronise`]
//! together with a [`contract::RepositoryClient`] and a [`contract::Fetch`].

pub mod config;
pub mod contract;
pub mod discovery;
pub mod download;
pub mod error;
pub mod metadata;
pub mod select;
pub mod synchronise;
pub mod temporary;
