mod engine_tests;
mod rewrite_tests;
