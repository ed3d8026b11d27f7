//! # edgar-ingest
//!
//! Ingestion and retrieval-index pipeline for SEC EDGAR filings.
//!
//! edgar-ingest scans a catalog of previously-downloaded regulatory filings,
//! extracts structured metadata from each raw submission, upserts one
//! durable document record per filing keyed by its published URL, and builds
//! a per-document retrieval index used for downstream question answering.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌───────────────┐
//! │ Catalog scan │──▶│   Upsert     │──▶│  Index build   │
//! │ parse header │   │ dedup by URL │   │ fetch+chunk+   │
//! │ per filing   │   │              │   │ embed, register│
//! └──────────────┘   └──────┬──────┘   └───────┬───────┘
//!                           │                  │
//!                           ▼                  ▼
//!                      ┌─────────────────────────┐
//!                      │   SQLite (documents,     │
//!                      │ index registry, vectors) │
//!                      └───────────┬─────────────┘
//!                                  │
//!                     ┌────────────┤
//!                     ▼            ▼
//!                ┌─────────┐  ┌──────────┐
//!                │   CLI   │  │   HTTP   │
//!                │ (edgar) │  │  (SSE)   │
//!                └─────────┘  └──────────┘
//! ```
//!
//! Re-running the pipeline over the same catalog is safe end to end: the
//! unique URL key turns repeat upserts into `duplicate` events, and the
//! index registry turns repeat builds into loads.
//!
//! ## Quick Start
//!
//! ```bash
//! edgar init                    # create database
//! edgar catalog AAPL            # inspect the on-disk catalog
//! edgar ingest AAPL             # upsert documents + build indexes
//! edgar documents               # list what is stored
//! edgar serve                   # start the HTTP/SSE server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`submission`] | Raw filing submission parser |
//! | [`catalog`] | Filing catalog scanner |
//! | [`companies`] | Symbol → company directory |
//! | [`store`] | Document store and index registry |
//! | [`migrate`] | Schema migrations |
//! | [`upsert`] | Document identity & upsert service |
//! | [`fetch`] | Streamed artifact retrieval |
//! | [`extract`] | Artifact text extraction |
//! | [`chunk`] | Page-aware text chunking |
//! | [`embedding`] | Embedding capability |
//! | [`index`] | Index build/load orchestration |
//! | [`pipeline`] | Ingestion pipeline driver |
//! | [`server`] | HTTP/SSE boundary |

pub mod catalog;
pub mod chunk;
pub mod companies;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod submission;
pub mod upsert;
