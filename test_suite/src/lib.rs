mod client;
mod config;
mod lookups;
mod model;
mod models;
mod object;
mod queryset;
mod related;
mod schema;
