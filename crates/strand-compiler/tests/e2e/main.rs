//! End-to-end tests for the Strand compiler
//!
//! These tests compile Strand source to x86-64 machine code; the
//! execution-gated ones install the code page and run it natively,
//! verifying return values.

mod harness;

mod arithmetic;
mod arrays;
mod classes;
mod concurrency;
mod control_flow;
mod functions;
mod pipeline;
mod strings;
