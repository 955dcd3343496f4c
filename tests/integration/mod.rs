//! Integration tests for the objsync client

mod action_executor;
mod object_edit_state;
mod query_cache;
mod test_utils;
mod transport_session;
