pub mod dynatrace {
    pub mod client;
}
