pub mod forum_service;
pub mod invalidation;
pub mod memory_vote_store;
pub mod pg_vote_store;
pub mod reconcile;
pub mod tally;
pub mod vote_engine;
pub mod vote_store;
