// Farmer record management: farmers plus their embedded farms, comments and memberships.
// Handlers stay thin; all store access goes through `records`.

pub mod handlers;
pub mod membership;
pub mod records;
pub mod validation;
