/*!
 * Authentication context extractors
 *
 * Responsibility:
 * - bearer middleware が付けた identity を handler に渡す
 * - axum との配線は core、extractor の型は types
 */

mod core;
mod types;

pub use self::core::current_user;
pub use self::types::{CurrentUser, MaybeUser};
