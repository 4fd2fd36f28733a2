//! CLI module for authoring - command-line interface and subcommands.
//!
//! Provides one-shot commands that fetch course resources and waffle flags
//! through an AuthoringSession and print the result.

pub mod commands;

pub use commands::Cli;
