// ─── Serverpacker Core ───
// Backend for converting client modpacks into dedicated servers.
//
// Architecture:
//   core/
//     config      — immutable run configuration + mirror rules
//     http        — shared HTTP client construction
//     fingerprint — content hashes used for registry lookups
//     downloader  — concurrent downloads with retry and mirror fallback
//     classifier  — multi-source detection of client-only mods
//     pack        — CurseForge / Modrinth modpack ingestion
//     server      — Fabric / Forge / NeoForge server installers
//     java        — PATH runtime probe
//     convert     — end-to-end conversion pipeline

pub mod classifier;
pub mod config;
pub mod convert;
pub mod downloader;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod java;
pub mod pack;
pub mod server;
