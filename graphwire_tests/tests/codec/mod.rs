mod config;
mod malformed;
mod random_graphs;
mod scenarios;
