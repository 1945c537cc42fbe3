// ============================================================================
// Domain Layer - Business Logic
// ============================================================================

pub mod order;
