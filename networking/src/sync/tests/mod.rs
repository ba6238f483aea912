pub(crate) mod common;

mod ancestor_search_tests;
mod start_round_tests;
mod states_tests;
