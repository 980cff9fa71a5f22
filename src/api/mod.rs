// =============================================================================
// HTTP API Module
// =============================================================================

pub mod rest;
