// =============================================================================
// API Module
// =============================================================================
//
// JSON surface consumed by the dashboard.

pub mod rest;
