//! Setting resolution: explicit call argument > per-asset override >
//! global default.

/// Return the first present value in precedence order.
///
/// Alert evaluation resolves its window and threshold through this chain;
/// keeping it a standalone function makes the precedence directly
/// testable instead of being buried in query plumbing.
pub fn resolve_override<T: Copy>(call: Option<T>, entity: Option<T>, default: T) -> T {
    call.or(entity).unwrap_or(default)
}
