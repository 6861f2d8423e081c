#![cfg(test)]

mod config;
mod finish;
mod fixtures;
mod hooks;
mod init;
mod topics;
mod update;
