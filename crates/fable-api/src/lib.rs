pub mod auth;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod reactions;
pub mod relays;
pub mod router;
pub mod stories;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod test_support;
