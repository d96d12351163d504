//! Core library for the abook-loader command line application.
//!
//! The library exposes the address-book pipeline that powers the
//! command-line interface as well as the tests. The modules are structured to
//! keep responsibilities narrow and composable: LDIF and spreadsheet adapters
//! live under [`abook::loader::io`], record types inside
//! [`abook::loader::model`], the organization tree in
//! [`abook::loader::hierarchy`], the LDAP seam under
//! [`abook::loader::directory`], and the delete-then-add run in
//! [`abook::loader::sync`].

pub mod abook;

pub use abook::loader::{LoaderError, Result, config, directory, error, hierarchy, io, model, sync};
