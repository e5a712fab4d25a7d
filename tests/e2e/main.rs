//! End-to-end scenarios against real stores in temp directories.

mod harness;
mod scenarios;
